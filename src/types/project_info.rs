use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ProjectInfo {
    pub project: String,
    pub chain: String,
    pub url: String,
    pub timetravel: bool,
}
