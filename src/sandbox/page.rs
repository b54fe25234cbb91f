use std::str::FromStr;
use std::sync::Arc;

use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::Level;

use super::SandboxError;
use crate::gateway::hash::{digest, Outcome};
use crate::logging::NotificationSink;
use crate::ports::{PendingPayment, PendingPaymentStore};
use crate::utils::sanitize::escape_html;

/// Operator's choice on the simulated 3-D Secure page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxAction {
    Success,
    Failed,
}

impl FromStr for SandboxAction {
    type Err = SandboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(SandboxAction::Success),
            "failed" => Ok(SandboxAction::Failed),
            _ => Err(SandboxError::InvalidParameters),
        }
    }
}

impl SandboxAction {
    fn outcome(&self) -> Outcome {
        match self {
            SandboxAction::Success => Outcome::Approved,
            SandboxAction::Failed => Outcome::Declined,
        }
    }

    fn result_code(&self) -> &'static str {
        match self {
            SandboxAction::Success => "Success",
            SandboxAction::Failed => "Failed",
        }
    }

    fn result_message(&self) -> &'static str {
        match self {
            SandboxAction::Success => "Payment successful",
            SandboxAction::Failed => "Payment declined by bank",
        }
    }
}

/// `ORDER-` plus 14 uppercase hex characters derived from the session code.
pub fn sandbox_trx_code(three_d_trx_code: &str) -> String {
    let hash = hex::encode(Sha256::digest(three_d_trx_code.as_bytes()));
    format!("ORDER-{}", hash[..14].to_uppercase())
}

/// The hosted page. Reads pending sessions and consumes them on submit.
pub struct SandboxPage {
    pending: Arc<dyn PendingPaymentStore>,
    sink: Arc<dyn NotificationSink>,
}

impl SandboxPage {
    pub fn new(pending: Arc<dyn PendingPaymentStore>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { pending, sink }
    }

    pub async fn show(&self, three_d_trx_code: &str) -> Result<String, SandboxError> {
        let code = three_d_trx_code.trim();
        if code.is_empty() {
            return Err(SandboxError::InvalidParameters);
        }

        let record = self
            .pending
            .get(code)
            .await?
            .ok_or(SandboxError::SessionExpired)?;

        self.sink.log(
            Level::INFO,
            "[Sandbox] Payment page displayed",
            json!({ "three_d_trx_code": code }),
        );

        Ok(render(code, &record))
    }

    /// Consumes the session and returns where to send the shopper: the
    /// stored redirect URL with the callback parameters appended.
    pub async fn submit(
        &self,
        three_d_trx_code: &str,
        action: SandboxAction,
    ) -> Result<String, SandboxError> {
        let code = three_d_trx_code.trim();
        if code.is_empty() {
            return Err(SandboxError::InvalidParameters);
        }

        let record = match self.pending.take(code).await? {
            Some(record) => record,
            None => {
                self.sink.log(
                    Level::WARN,
                    "[Sandbox] Payment session expired",
                    json!({ "three_d_trx_code": code }),
                );
                return Err(SandboxError::SessionExpired);
            }
        };

        let trx_code = sandbox_trx_code(code);
        let hash_value = digest(&record.code_for_hash, action.outcome());

        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("sandbox_payment", "1")
            .append_pair("trxCode", &trx_code)
            .append_pair("OtherTrxCode", &record.other_trx_code)
            .append_pair("hashValue", &hash_value)
            .append_pair("resultCode", action.result_code())
            .append_pair("resultMessage", action.result_message())
            .finish();

        let separator = if record.redirect_url.contains('?') { '&' } else { '?' };
        let redirect = format!("{}{}{}", record.redirect_url, separator, query);

        self.sink.log(
            Level::INFO,
            "[Sandbox] Payment processed",
            json!({
                "three_d_trx_code": code,
                "action": action.result_code(),
                "trx_code": trx_code,
                "other_trx_code": record.other_trx_code,
            }),
        );

        Ok(redirect)
    }
}

fn render(code: &str, record: &PendingPayment) -> String {
    let short_code: String = code.chars().take(20).collect();
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>United Payment Sandbox</title>
<style>
body {{ font-family: sans-serif; background: #f4f5f7; margin: 0; padding: 40px 16px; }}
.card {{ max-width: 420px; margin: 0 auto; background: #fff; border-radius: 8px; padding: 24px; box-shadow: 0 2px 8px rgba(0,0,0,.08); }}
.badge {{ display: inline-block; background: #ffb400; color: #000; font-size: 12px; padding: 2px 8px; border-radius: 4px; }}
dl {{ display: grid; grid-template-columns: auto 1fr; gap: 8px 16px; }}
dt {{ color: #666; }}
.actions {{ display: flex; gap: 12px; margin-top: 24px; }}
button {{ flex: 1; padding: 12px; border: 0; border-radius: 4px; font-size: 15px; cursor: pointer; }}
.approve {{ background: #1a7f37; color: #fff; }}
.decline {{ background: #cf222e; color: #fff; }}
</style>
</head>
<body>
<div class="card">
<span class="badge">TEST MODE</span>
<h1>3D Secure Verification</h1>
<dl>
<dt>3D Code</dt><dd>{short_code}...</dd>
<dt>Reference</dt><dd>{reference}</dd>
<dt>Amount</dt><dd>{amount:.2} {currency}</dd>
<dt>Dealer</dt><dd>{dealer}</dd>
</dl>
<form method="post" action="?threeDTrxCode={code}">
<div class="actions">
<button class="approve" type="submit" name="payment_action" value="success">Approve payment</button>
<button class="decline" type="submit" name="payment_action" value="failed">Decline payment</button>
</div>
</form>
</div>
</body>
</html>
"#,
        short_code = escape_html(&short_code),
        reference = escape_html(&record.other_trx_code),
        amount = record.amount,
        currency = escape_html(&record.currency),
        dealer = escape_html(&record.dealer_code),
        code = escape_html(&url::form_urlencoded::byte_serialize(code.as_bytes()).collect::<String>()),
    )
}
