//! Password reset token hand-off
//!
//! Delivery (email) is not implemented; [`LogResetDelivery`] records that a token
//! was produced without ever writing the token itself to the response.

use async_trait::async_trait;
use tracing::info;

use super::models::User;
use crate::common::{safe_email_log, safe_token_log};

#[async_trait]
pub trait ResetDelivery: Send + Sync {
    async fn deliver(&self, user: &User, reset_token: &str);
}

/// Logs a masked token in place of sending an email
pub struct LogResetDelivery;

#[async_trait]
impl ResetDelivery for LogResetDelivery {
    async fn deliver(&self, user: &User, reset_token: &str) {
        // TODO: send the reset link through the transactional email provider once one is chosen
        info!(
            user_id = user.id,
            email = %safe_email_log(&user.email),
            token = %safe_token_log(reset_token),
            "Password reset token generated (email delivery not configured)"
        );
    }
}
