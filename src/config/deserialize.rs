// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Handles gateway route lists in shorthand or detailed form.

use nonempty::NonEmpty;
use serde::Deserialize;

use crate::gateway::Route;

pub fn deserialize_routes<'de, D>(deserializer: D) -> Result<NonEmpty<Route>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<RouteEntry> = Vec::deserialize(deserializer)?;
    let routes = values
        .into_iter()
        .map(RouteEntry::into_route)
        .collect::<Result<Vec<_>, _>>()
        .map_err(serde::de::Error::custom)?;

    NonEmpty::from_vec(routes)
        .ok_or_else(|| serde::de::Error::custom("at least one gateway route is required"))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RouteEntry {
    Simple(String),
    Detailed { method: String, path: String },
}

impl RouteEntry {
    fn into_route(self) -> Result<Route, String> {
        match self {
            RouteEntry::Simple(s) => Route::parse(&s).map_err(|e| e.to_string()),
            RouteEntry::Detailed { method, path } => method
                .parse()
                .and_then(|method| Route::new(method, path))
                .map_err(|e: crate::gateway::GatewayError| e.to_string()),
        }
    }
}
