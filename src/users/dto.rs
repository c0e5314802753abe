use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeInfoRequest {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
}
