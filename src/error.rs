//! CLI Error Types

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not open the history database")]
    Database,
    #[display("could not read history")]
    History,
    #[display("intake failed")]
    Intake,
    #[display("undo failed")]
    Undo,
    #[display("invalid path argument")]
    Path,
}
