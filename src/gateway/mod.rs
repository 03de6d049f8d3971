// ABOUTME: HTTP gateway declaration bound to the updated function.
// ABOUTME: Builds the resource tree, proxy integrations, invoke permission, deployment and stage.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{FunctionName, Region};

pub const DEFAULT_STAGE: &str = "prod";
const INVOKE_PRINCIPAL: &str = "apigateway.amazonaws.com";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("unsupported HTTP method '{0}'")]
    Method(String),

    #[error("invalid route '{route}': {reason}")]
    Route { route: String, reason: &'static str },

    #[error("gateway integration needs a function ARN, got '{0}'")]
    NotAnArn(String),

    #[error("route {0} is declared twice")]
    DuplicateRoute(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Any,
}

impl FromStr for HttpMethod {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            "ANY" => Ok(HttpMethod::Any),
            _ => Err(GatewayError::Method(s.to_string())),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Any => "ANY",
        };
        f.write_str(s)
    }
}

/// One HTTP method on one path, e.g. `GET /items/{id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub method: HttpMethod,
    pub path: String,
}

impl Route {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Result<Self, GatewayError> {
        let route = Self {
            method,
            path: path.into(),
        };
        route.segments()?;
        Ok(route)
    }

    /// Parse the `"METHOD /path"` shorthand.
    pub fn parse(input: &str) -> Result<Self, GatewayError> {
        let (method, path) = input.trim().split_once(char::is_whitespace).ok_or(
            GatewayError::Route {
                route: input.to_string(),
                reason: "expected 'METHOD /path'",
            },
        )?;
        Self::new(method.parse()?, path.trim())
    }

    fn segments(&self) -> Result<Vec<&str>, GatewayError> {
        let invalid = |reason| GatewayError::Route {
            route: self.to_string(),
            reason,
        };
        let rest = self
            .path
            .strip_prefix('/')
            .ok_or_else(|| invalid("path must start with '/'"))?;
        if rest.is_empty() {
            return Ok(Vec::new());
        }
        let segments: Vec<&str> = rest.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(invalid("path has an empty segment"));
        }
        Ok(segments)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiDeclaration {
    pub name: String,
    pub description: String,
}

/// A path segment resource. The root resource `/` is implicit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathResource {
    pub path: String,
    pub path_part: String,
    /// Parent path; `/` for top-level segments.
    pub parent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Integration {
    pub path: String,
    pub http_method: HttpMethod,
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Proxy integrations are always invoked with POST.
    pub integration_http_method: HttpMethod,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvokePermission {
    pub action: &'static str,
    pub function: String,
    pub principal: &'static str,
    /// Appended to the API's execution ARN once it exists.
    pub source_arn_suffix: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentDeclaration {
    /// Integrations whose change forces a redeploy; the deployment is ordered after all of them.
    pub triggers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageDeclaration {
    pub name: String,
}

/// Everything the declarative engine needs to expose the function over HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayPlan {
    pub api: ApiDeclaration,
    pub resources: Vec<PathResource>,
    pub integrations: Vec<Integration>,
    pub permission: InvokePermission,
    pub deployment: DeploymentDeclaration,
    pub stage: StageDeclaration,
}

/// Integration URI for invoking `function_arn` through the gateway.
pub fn invocation_uri(region: &Region, function_arn: &str) -> String {
    format!("arn:aws:apigateway:{region}:lambda:path/2015-03-31/functions/{function_arn}/invocations")
}

impl GatewayPlan {
    pub fn builder(name: impl Into<String>) -> GatewayPlanBuilder {
        GatewayPlanBuilder {
            name: name.into(),
            description: String::new(),
            stage: DEFAULT_STAGE.to_string(),
            routes: Vec::new(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone)]
pub struct GatewayPlanBuilder {
    name: String,
    description: String,
    stage: String,
    routes: Vec<Route>,
}

impl GatewayPlanBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = stage.into();
        self
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    pub fn routes(mut self, routes: impl IntoIterator<Item = Route>) -> Self {
        self.routes.extend(routes);
        self
    }

    /// Bind every route to `function`, which must be an ARN.
    pub fn build(
        self,
        region: &Region,
        function: &FunctionName,
    ) -> Result<GatewayPlan, GatewayError> {
        if !function.is_arn() {
            return Err(GatewayError::NotAnArn(function.to_string()));
        }
        let uri = invocation_uri(region, function.as_str());

        let mut resources: IndexMap<String, PathResource> = IndexMap::new();
        let mut integrations: IndexMap<String, Integration> = IndexMap::new();
        for route in &self.routes {
            let mut parent = "/".to_string();
            for segment in route.segments()? {
                let path = if parent == "/" {
                    format!("/{segment}")
                } else {
                    format!("{parent}/{segment}")
                };
                resources
                    .entry(path.clone())
                    .or_insert_with(|| PathResource {
                        path: path.clone(),
                        path_part: segment.to_string(),
                        parent: parent.clone(),
                    });
                parent = path;
            }

            let key = route.to_string();
            if integrations.contains_key(&key) {
                return Err(GatewayError::DuplicateRoute(key));
            }
            integrations.insert(
                key,
                Integration {
                    path: route.path.clone(),
                    http_method: route.method,
                    kind: "AWS_PROXY",
                    integration_http_method: HttpMethod::Post,
                    uri: uri.clone(),
                },
            );
        }

        tracing::debug!(
            api = %self.name,
            resources = resources.len(),
            integrations = integrations.len(),
            "gateway plan built"
        );

        Ok(GatewayPlan {
            api: ApiDeclaration {
                name: self.name,
                description: self.description,
            },
            resources: resources.into_values().collect(),
            deployment: DeploymentDeclaration {
                triggers: integrations.keys().cloned().collect(),
            },
            integrations: integrations.into_values().collect(),
            permission: InvokePermission {
                action: "lambda:InvokeFunction",
                function: function.to_string(),
                principal: INVOKE_PRINCIPAL,
                source_arn_suffix: "/*/*",
            },
            stage: StageDeclaration { name: self.stage },
        })
    }
}
