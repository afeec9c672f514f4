pub mod criterion;
pub mod delivery_status;
pub mod lifecycle;
pub mod pick;
pub mod stage;
