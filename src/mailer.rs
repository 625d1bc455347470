use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;

/// An email template embedded at compile time. `{key}` placeholders are
/// substituted from the data map at send time.
pub struct Template {
    pub subject: &'static str,
    pub text_body: &'static str,
    pub html_body: &'static str,
}

pub const USER_WELCOME: Template = Template {
    subject: include_str!("../templates/user_welcome.subject.txt"),
    text_body: include_str!("../templates/user_welcome.text.txt"),
    html_body: include_str!("../templates/user_welcome.html"),
};

pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl Mailer {
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(Duration::from_secs(5)))
            .build();
        let sender = config
            .sender
            .parse::<Mailbox>()
            .context("parse SMTP sender address")?;
        Ok(Self { transport, sender })
    }

    pub async fn send(
        &self,
        recipient: &str,
        template: &Template,
        data: &HashMap<&str, String>,
    ) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.sender.clone())
            .to(recipient.parse::<Mailbox>().context("parse recipient")?)
            .subject(render(template.subject, data).trim())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(render(template.text_body, data)),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(render(template.html_body, data)),
                    ),
            )?;

        self.transport.send(message).await?;
        Ok(())
    }
}

fn render(template: &str, data: &HashMap<&str, String>) -> String {
    let mut out = template.to_string();
    for (key, value) in data {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}
