use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub validate: bool,
}

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub credential: String,
}
