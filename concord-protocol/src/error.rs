use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
#[error("invalid object id: {0}")]
pub struct InvalidObjectId(pub String);

#[derive(Error, Debug, PartialEq)]
#[error("invalid element id: {0}")]
pub struct InvalidElementId(pub String);
