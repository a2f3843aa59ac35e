use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid value: {message}")]
    InvalidValue { message: String },

    #[error("unknown parent bone '{parent}' for bone '{bone}'")]
    UnknownBoneParent { bone: String, parent: String },

    #[error("duplicate bone name '{name}'")]
    DuplicateBone { name: String },

    #[cfg(feature = "binary")]
    #[error("failed to parse VMD data: {message}")]
    VmdParse { message: String },

    #[cfg(feature = "binary")]
    #[error("unsupported or invalid VMD signature: {value}")]
    VmdSignature { value: String },
}
