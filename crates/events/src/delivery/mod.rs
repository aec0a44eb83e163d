//! Push provider delivery: credential exchange and the FCM HTTP v1 client.

pub mod credential;
pub mod fcm;
