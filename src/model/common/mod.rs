pub mod biometric;
pub mod election;
pub mod reason;
