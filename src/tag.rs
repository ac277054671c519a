use serde::de::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Reserved prefix of the executor-defined tag vocabulary.
const RESERVED_PREFIX: &str = "gantry:";

/// A tag attached to a command and forwarded to the executor.
///
/// The `gantry:` prefix is reserved for tags the executor gives meaning
/// to; the authoring side only stores and serializes them. Anything else
/// round-trips as [`Tag::Custom`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Tag {
    /// Don't be verbose if the command succeeded.
    Quiet,
    /// Always show verbose output.
    Verbose,
    /// Keep running and don't be verbose if the command failed.
    Condition,
    /// Always execute, without caching.
    NoCache,
    /// Don't use the remote cache.
    NoRemoteCache,
    /// Disable sandbox and also caching, for commands with unspecified
    /// input/output files.
    NoSandbox,
    /// Free-form tag, passed through verbatim.
    Custom(String),
}

impl Tag {
    pub fn as_str(&self) -> &str {
        match self {
            Tag::Quiet => "gantry:quiet",
            Tag::Verbose => "gantry:verbose",
            Tag::Condition => "gantry:condition",
            Tag::NoCache => "gantry:no-cache",
            Tag::NoRemoteCache => "gantry:no-remote-cache",
            Tag::NoSandbox => "gantry:no-sandbox",
            Tag::Custom(tag) => tag,
        }
    }
}

impl Serialize for Tag {
    fn serialize<S>(&self, ser: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        ser.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D>(de: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tag = String::deserialize(de)?;
        match tag.strip_prefix(RESERVED_PREFIX) {
            Some("quiet") => Ok(Tag::Quiet),
            Some("verbose") => Ok(Tag::Verbose),
            Some("condition") => Ok(Tag::Condition),
            Some("no-cache") => Ok(Tag::NoCache),
            Some("no-remote-cache") => Ok(Tag::NoRemoteCache),
            Some("no-sandbox") => Ok(Tag::NoSandbox),
            Some(_) => Err(Error::custom(format!(
                "unknown tag ({RESERVED_PREFIX} prefix is reserved): {tag}"
            ))),
            None => Ok(Tag::Custom(tag)),
        }
    }
}
