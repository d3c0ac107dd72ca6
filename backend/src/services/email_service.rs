use crate::config::EmailConfig;
use crate::errors::{ServiceError, ServiceResult};
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::str::FromStr;

pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    config: EmailConfig,
}

impl EmailService {
    /// Creates a new EmailService instance
    pub fn new(config: EmailConfig) -> ServiceResult<Self> {
        let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| ServiceError::internal_error(format!("Invalid SMTP host: {e}")))?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        Ok(Self { mailer, config })
    }

    /// Sends the one-time password-reset code.
    pub async fn send_password_reset_otp(
        &self,
        recipient_email: &str,
        username: &str,
        otp: &str,
        valid_minutes: u64,
    ) -> ServiceResult<()> {
        let subject = "Your password reset code";
        let html_content = format!(
            r#"
            <!DOCTYPE html>
            <html>
            <body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
                <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
                    <h2 style="color: #2c3e50;">Password reset</h2>
                    <p>Hi {username},</p>
                    <p>Use the code below to reset your password:</p>
                    <p style="font-size: 28px; letter-spacing: 6px; font-weight: bold;">{otp}</p>
                    <p style="font-size: 12px; color: #7f8c8d;">
                        This code expires in {valid_minutes} minutes. If you didn't request a reset,
                        you can safely ignore this email.
                    </p>
                </div>
            </body>
            </html>
            "#
        );
        let text_content = format!(
            "Hi {username},\n\nYour password reset code is {otp}.\n\nThis code expires in {valid_minutes} minutes. If you didn't request a reset, you can safely ignore this email.\n"
        );

        self.send_email(recipient_email, subject, &html_content, &text_content)
            .await
    }

    /// Sends the email verification link.
    pub async fn send_verification_email(
        &self,
        recipient_email: &str,
        username: &str,
        token: &str,
    ) -> ServiceResult<()> {
        let subject = "Verify your email address";
        let verify_url = format!("{}/verify-email/{}", self.config.base_url, token);
        let html_content = format!(
            r#"
            <!DOCTYPE html>
            <html>
            <body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
                <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
                    <h2 style="color: #2c3e50;">Welcome, {username}!</h2>
                    <p>Please confirm your email address:</p>
                    <div style="text-align: center; margin: 30px 0;">
                        <a href="{verify_url}"
                           style="background-color: #3498db; color: white; padding: 12px 30px;
                                  text-decoration: none; border-radius: 5px; display: inline-block;">
                            Verify Email
                        </a>
                    </div>
                    <p>Or copy and paste this link into your browser:</p>
                    <p style="word-break: break-all; color: #7f8c8d;">{verify_url}</p>
                    <p style="font-size: 12px; color: #7f8c8d;">This link expires in 24 hours.</p>
                </div>
            </body>
            </html>
            "#
        );
        let text_content = format!(
            "Welcome, {username}!\n\nPlease confirm your email address:\n{verify_url}\n\nThis link expires in 24 hours.\n"
        );

        self.send_email(recipient_email, subject, &html_content, &text_content)
            .await
    }

    /// Sends a generic email
    pub async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        html_content: &str,
        text_content: &str,
    ) -> ServiceResult<()> {
        let from_mailbox = Mailbox::from_str(&format!(
            "{} <{}>",
            self.config.from_name, self.config.from_email
        ))
        .map_err(|e| ServiceError::internal_error(format!("Invalid from email: {e}")))?;

        let to_mailbox = Mailbox::from_str(to_email)
            .map_err(|e| ServiceError::validation(format!("Invalid recipient email: {e}")))?;

        let email = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .multipart(
                lettre::message::MultiPart::alternative()
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_content.to_string()),
                    )
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_content.to_string()),
                    ),
            )
            .map_err(|e| ServiceError::internal_error(format!("Failed to build email: {e}")))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| ServiceError::internal_error(format!("Failed to send email: {e}")))?;

        Ok(())
    }
}
