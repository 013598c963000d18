use calmcp_common::FromMessage;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Both parse strategies rejected the input.
    #[error("XML parse error: {message}")]
    Parse { message: String },

    /// A builder method was called after `dispose()`.
    #[error("XML document builder has already been disposed")]
    Disposed,

    /// Child elements were requested under an element that holds text or is self-closing.
    #[error("element <{element}> cannot take child elements")]
    MixedContent { element: String },

    /// The document carries a `<!DOCTYPE>`. Terminal: the fallback parse
    /// refuses it too.
    #[error("DOCTYPE declarations are not accepted")]
    DtdForbidden,

    #[error("unknown entity reference &{0};")]
    UnknownEntity(String),

    #[error("unterminated entity reference &{0}")]
    UnclosedEntity(String),

    #[error("{0}")]
    Message(String),
}

impl Error {
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Self::parse(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Self::parse(err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Self {
        Self::parse(err.to_string())
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

pub type XmlError = Error;
pub type Result<T> = std::result::Result<T, Error>;

calmcp_common::impl_context!();
