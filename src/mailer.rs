use std::sync::Mutex;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outbound email delivery. Failures are reported but never retried.
pub trait Mailer: Send + Sync {
    fn send(&self, message: &EmailMessage) -> anyhow::Result<()>;
}

/// Writes messages to the log instead of an SMTP relay.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        tracing::info!(to = %message.to, subject = %message.subject, "email dispatched");
        tracing::debug!(body = %message.body, "email body");
        Ok(())
    }
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct Outbox {
    sent: Mutex<Vec<EmailMessage>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    pub fn last_to(&self, to: &str) -> Option<EmailMessage> {
        self.messages().into_iter().rev().find(|m| m.to == to)
    }
}

impl Mailer for Outbox {
    fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        self.sent
            .lock()
            .map_err(|_| anyhow::anyhow!("outbox lock poisoned"))?
            .push(message.clone());
        Ok(())
    }
}

pub fn confirmation_email(from: &str, to: &str, code: &str) -> EmailMessage {
    EmailMessage {
        from: from.to_string(),
        to: to.to_string(),
        subject: "Registration confirmation".to_string(),
        body: format!("Confirmation code: {code}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbox_records_in_order() {
        let outbox = Outbox::new();
        outbox.send(&confirmation_email("noreply@x", "a@x.io", "one")).unwrap();
        outbox.send(&confirmation_email("noreply@x", "b@x.io", "two")).unwrap();
        outbox.send(&confirmation_email("noreply@x", "a@x.io", "three")).unwrap();

        assert_eq!(outbox.messages().len(), 3);
        assert_eq!(outbox.last_to("a@x.io").unwrap().body, "Confirmation code: three");
        assert!(outbox.last_to("c@x.io").is_none());
    }
}
