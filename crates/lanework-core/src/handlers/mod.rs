//! Built-in job handlers.

pub mod csv_export;
pub mod email_send;

pub use self::csv_export::{CsvExport, CsvExportHandler, CsvExportResult};
pub use self::email_send::{
    EmailSend, EmailSendHandler, EmailSendResult, MailError, Mailer, MailerConfig, SmtpMailer,
};
