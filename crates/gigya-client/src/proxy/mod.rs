//! Dynamic remote-call proxy
//!
//! A [`Cursor`] turns a chain of field accesses into remote calls. On an
//! unbound cursor (nothing fetched yet) the first access fetches
//! `area.get{Field}`; later accesses navigate the fetched payload. Assigning
//! through a cursor rebuilds the path as a nested skeleton and sends it to
//! the matching `set` function.
//!
//! ```no_run
//! # use gigya_client::{Connection, ConnectionConfig, ClientResult};
//! # async fn demo(connection: Connection) -> ClientResult<()> {
//! let account = connection.area("accounts").get("account_info").await?;
//! let first_name = account.into_cursor().map(|c| c.navigate("profile"));
//! # Ok(())
//! # }
//! ```
//!
//! Cursors are immutable snapshots: navigation clones the path and appends
//! one segment, sharing the fetched payload.

mod naming;

pub use naming::{to_remote_field_name, to_remote_function_name};

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use crate::connection::{CallOptions, Connection, Params};
use crate::error::{ClientError, ClientResult};
use crate::response::ApiResponse;
use crate::transport::HttpMethod;

/// Prefix marking a field name as literal in string form
const LITERAL_PREFIX: &str = "__";

/// A field access on a cursor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    name: String,
    literal: bool,
}

impl Field {
    /// Field whose name is case-normalized before use
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            literal: false,
        }
    }

    /// Field whose name is used exactly as given
    pub fn literal(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            literal: true,
        }
    }

    /// Parse a field from text; a leading `__` marks it literal
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(LITERAL_PREFIX) {
            Some(name) => Self::literal(name),
            None => Self::new(raw),
        }
    }

    /// Name as given
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the name bypasses case normalization
    pub fn is_literal(&self) -> bool {
        self.literal
    }

    /// Key used in remote payloads
    pub fn remote_name(&self) -> String {
        to_remote_field_name(&self.name, self.literal)
    }

    /// Remote function for this field with the given verb prefix
    pub fn function_name(&self, prefix: &str) -> String {
        to_remote_function_name(prefix, &self.name, self.literal)
    }
}

impl From<&str> for Field {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<String> for Field {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

/// Operation applied to a cursor
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyOp {
    /// Fetch `get{Field}` from the bound area
    Fetch(Field),
    /// Step into the fetched payload
    Navigate(Field),
    /// Assign a value
    Set(Field, Value),
}

impl ProxyOp {
    fn name(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch",
            Self::Navigate(_) => "navigate",
            Self::Set(..) => "set",
        }
    }
}

/// Outcome of a cursor operation
#[derive(Debug, Clone)]
pub enum Step {
    /// A new cursor (fetched payload, container or absent value)
    Cursor(Cursor),
    /// A scalar reached while navigating
    Value(Value),
    /// Response of a setter call
    Response(ApiResponse),
}

impl Step {
    /// The cursor, if this step produced one
    pub fn into_cursor(self) -> Option<Cursor> {
        match self {
            Self::Cursor(cursor) => Some(cursor),
            _ => None,
        }
    }

    /// The setter response, if this step produced one
    pub fn into_response(self) -> Option<ApiResponse> {
        match self {
            Self::Response(response) => Some(response),
            _ => None,
        }
    }

    /// Resolved JSON value of this step
    ///
    /// Cursors resolve to the value at their path, responses to their body.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Self::Cursor(cursor) => cursor.value().cloned(),
            Self::Value(value) => Some(value.clone()),
            Self::Response(response) => Some(Value::Object(response.as_map().clone())),
        }
    }
}

/// Position within remote data
#[derive(Debug, Clone)]
pub struct Cursor {
    connection: Connection,
    area: Option<String>,
    function: Option<String>,
    payload: Option<Arc<Value>>,
    path: Vec<String>,
}

impl Cursor {
    /// Unbound cursor with no area
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            area: None,
            function: None,
            payload: None,
            path: Vec::new(),
        }
    }

    /// Copy of this cursor bound to `area`, with nothing fetched
    pub fn bind_area(self, area: impl Into<String>) -> Self {
        Self {
            area: Some(area.into()),
            function: None,
            payload: None,
            path: Vec::new(),
            ..self
        }
    }

    /// Cursor over an already fetched payload
    pub fn from_payload(
        connection: Connection,
        area: impl Into<String>,
        function: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            connection,
            area: Some(area.into()),
            function: Some(function.into()),
            payload: Some(Arc::new(payload)),
            path: Vec::new(),
        }
    }

    /// Bound area
    pub fn area(&self) -> Option<&str> {
        self.area.as_deref()
    }

    /// Function the payload was fetched from
    pub fn function(&self) -> Option<&str> {
        self.function.as_deref()
    }

    /// Keys navigated so far
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Fetched payload
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_deref()
    }

    /// Whether a payload has been fetched
    pub fn is_bound(&self) -> bool {
        self.payload.is_some()
    }

    /// Value at the current path
    ///
    /// `None` as soon as any key along the path is missing or `null`.
    /// Array elements are addressed by decimal index.
    pub fn value(&self) -> Option<&Value> {
        let mut current = self.payload.as_deref()?;
        for key in &self.path {
            current = child(current, key)?;
        }
        match current {
            Value::Null => None,
            other => Some(other),
        }
    }

    /// Fetch when unbound, navigate when bound
    ///
    /// # Errors
    ///
    /// See [`Cursor::apply`].
    pub async fn get(&self, field: impl Into<Field>) -> ClientResult<Step> {
        let field = field.into();
        let op = if self.is_bound() {
            ProxyOp::Navigate(field)
        } else {
            ProxyOp::Fetch(field)
        };
        self.apply(op).await
    }

    /// Assign `value` to `field`, returning the setter's response
    ///
    /// # Errors
    ///
    /// See [`Cursor::apply`].
    pub async fn set(&self, field: impl Into<Field>, value: impl Into<Value>) -> ClientResult<ApiResponse> {
        let step = self.apply(ProxyOp::Set(field.into(), value.into())).await?;
        step.into_response()
            .ok_or_else(|| ClientError::UnsupportedOperation("set did not produce a response".into()))
    }

    /// Step into the payload without going through [`Cursor::apply`]
    ///
    /// # Errors
    ///
    /// Fails with [`ClientError::UnboundProxy`] without an area and
    /// [`ClientError::UnsupportedOperation`] on an unfetched cursor.
    pub fn navigate(&self, field: impl Into<Field>) -> ClientResult<Step> {
        self.require_area("navigate")?;
        if !self.is_bound() {
            return Err(ClientError::UnsupportedOperation(
                "cannot navigate before anything is fetched".into(),
            ));
        }
        Ok(self.step_into(&field.into()))
    }

    /// Run one proxy operation
    ///
    /// # Errors
    ///
    /// - [`ClientError::UnboundProxy`] when no area is bound
    /// - [`ClientError::UnsupportedOperation`] for a fetch on a fetched
    ///   cursor, a navigation on an unfetched one, or a setter whose path
    ///   runs through a scalar
    ///
    /// Remote errors are not raised; they come back in the response.
    pub async fn apply(&self, op: ProxyOp) -> ClientResult<Step> {
        let area = self.require_area(op.name())?;

        match (op, self.is_bound()) {
            (ProxyOp::Fetch(field), false) => {
                let function = field.function_name("get");
                debug!(area = %area, function = %function, "Proxy fetch");
                let response = self
                    .connection
                    .call(HttpMethod::Get, area, &function, Params::new(), &CallOptions::default())
                    .await?;

                Ok(Step::Cursor(Self {
                    connection: self.connection.clone(),
                    area: self.area.clone(),
                    function: Some(function),
                    payload: Some(Arc::new(response.into_value())),
                    path: Vec::new(),
                }))
            }
            (ProxyOp::Fetch(field), true) => Err(ClientError::UnsupportedOperation(format!(
                "cannot fetch `{}` through an already fetched cursor",
                field.name()
            ))),
            (ProxyOp::Navigate(field), true) => Ok(self.step_into(&field)),
            (ProxyOp::Navigate(field), false) => Err(ClientError::UnsupportedOperation(format!(
                "cannot navigate to `{}` before anything is fetched",
                field.name()
            ))),
            (ProxyOp::Set(field, value), false) => {
                let function = field.function_name("set");
                let mut params = Params::new();
                params.insert(field.remote_name(), value);
                debug!(area = %area, function = %function, "Proxy direct set");

                let response = self
                    .connection
                    .call(HttpMethod::Get, area, &function, params, &CallOptions::default())
                    .await?;
                Ok(Step::Response(response))
            }
            (ProxyOp::Set(field, value), true) => {
                let params = self.setter_params(&field, value)?;
                let function = self.setter_function();
                debug!(area = %area, function = %function, path = ?self.path, "Proxy nested set");

                let response = self
                    .connection
                    .call(HttpMethod::Get, area, &function, params, &CallOptions::default())
                    .await?;
                Ok(Step::Response(response))
            }
        }
    }

    fn require_area(&self, operation: &str) -> ClientResult<&str> {
        self.area
            .as_deref()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| ClientError::unbound_proxy(operation))
    }

    fn step_into(&self, field: &Field) -> Step {
        let mut path = self.path.clone();
        path.push(field.remote_name());
        let next = Self {
            connection: self.connection.clone(),
            area: self.area.clone(),
            function: self.function.clone(),
            payload: self.payload.clone(),
            path,
        };

        match next.value() {
            None | Some(Value::Object(_)) | Some(Value::Array(_)) => Step::Cursor(next),
            Some(scalar) => Step::Value(scalar.clone()),
        }
    }

    fn setter_function(&self) -> String {
        let function = self.function.as_deref().unwrap_or_default();
        match function.strip_prefix("get") {
            Some(rest) => format!("set{rest}"),
            None => function.to_string(),
        }
    }

    /// Rebuild the navigated path as a nested skeleton ending in `value`
    ///
    /// Maps along the path are rebuilt empty, arrays keep their elements,
    /// missing keys become maps. Top-level containers are sent as JSON text.
    fn setter_params(&self, field: &Field, value: Value) -> ClientResult<Params> {
        let mut root = Value::Object(Map::new());
        let mut original = self.payload.as_deref();
        let mut slot = &mut root;

        for key in &self.path {
            original = original.and_then(|o| child(o, key));
            let shell = match original {
                None | Some(Value::Null) | Some(Value::Object(_)) => Value::Object(Map::new()),
                Some(Value::Array(items)) => Value::Array(items.clone()),
                Some(_) => {
                    return Err(ClientError::UnsupportedOperation(format!(
                        "cannot set `{}` below scalar `{key}`",
                        field.name()
                    )));
                }
            };
            slot = put(slot, key, shell)?;
        }
        put(slot, &field.remote_name(), value)?;

        let Value::Object(skeleton) = root else {
            return Ok(Params::new());
        };
        Ok(skeleton
            .into_iter()
            .map(|(k, v)| match v {
                Value::Object(_) | Value::Array(_) => (k, Value::String(v.to_string())),
                scalar => (k, scalar),
            })
            .collect())
    }
}

fn child<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let found = match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }?;
    (!found.is_null()).then_some(found)
}

/// Store `value` under `key` in a container, returning the stored slot
fn put<'a>(container: &'a mut Value, key: &str, value: Value) -> ClientResult<&'a mut Value> {
    match container {
        Value::Object(map) => {
            let slot = map.entry(key.to_string()).or_insert(Value::Null);
            *slot = value;
            Ok(slot)
        }
        Value::Array(items) => {
            let index = key.parse::<usize>().map_err(|_| {
                ClientError::UnsupportedOperation(format!("`{key}` is not an array index"))
            })?;
            if index < items.len() {
                items[index] = value;
                Ok(&mut items[index])
            } else if index == items.len() {
                items.push(value);
                items.last_mut().ok_or_else(|| {
                    ClientError::UnsupportedOperation("array append failed".into())
                })
            } else {
                Err(ClientError::UnsupportedOperation(format!(
                    "index {index} is past the end of a {}-element array",
                    items.len()
                )))
            }
        }
        _ => Err(ClientError::UnsupportedOperation(format!(
            "cannot store `{key}` in a scalar"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;
    use crate::testing::mock_connection;
    use serde_json::json;

    fn bound(payload: Value, function: &str) -> Cursor {
        let (connection, _) = mock_connection(ConnectionConfig::builder("key").build());
        Cursor::from_payload(connection, "accounts", function, payload)
    }

    #[test]
    fn test_field_parse() {
        assert_eq!(Field::parse("__UID"), Field::literal("UID"));
        assert_eq!(Field::parse("first_name"), Field::new("first_name"));
        assert_eq!(Field::parse("first_name").remote_name(), "firstName");
        assert_eq!(Field::parse("__first_name").remote_name(), "first_name");
    }

    fn cursor_at(cursor: &Cursor, field: &str) -> Cursor {
        cursor
            .navigate(field)
            .expect("bound")
            .into_cursor()
            .expect("container or absent")
    }

    #[test]
    fn test_value_walks_path() {
        let cursor = bound(json!({"profile": {"phones": [{"number": "555"}]}}), "getAccountInfo");
        let phones = cursor_at(&cursor_at(&cursor, "profile"), "phones");
        assert_eq!(phones.path(), ["profile".to_string(), "phones".to_string()]);
        assert!(phones.value().is_some_and(Value::is_array));

        let first = cursor_at(&phones, "0");
        match first.navigate("number").expect("bound") {
            Step::Value(number) => assert_eq!(number, json!("555")),
            other => panic!("expected a scalar, got {other:?}"),
        }
    }

    #[test]
    fn test_null_and_missing_are_absent() {
        let cursor = bound(json!({"profile": {"nickname": null}}), "getAccountInfo");
        let nickname = cursor_at(&cursor_at(&cursor, "profile"), "nickname");
        assert!(nickname.value().is_none());

        let deeper = cursor_at(&nickname, "first");
        assert!(deeper.value().is_none());
    }

    #[test]
    fn test_setter_function_swaps_prefix() {
        assert_eq!(bound(json!({}), "getProfile").setter_function(), "setProfile");
        assert_eq!(bound(json!({}), "search").setter_function(), "search");
    }

    #[test]
    fn test_setter_params_serialize_top_level_containers() {
        let cursor = bound(
            json!({"profile": {"firstName": "Jim", "lastName": "Jones"}, "UID": "u"}),
            "getAccountInfo",
        );
        let profile = cursor_at(&cursor, "profile");
        let params = profile
            .setter_params(&Field::new("first_name"), json!("Ann"))
            .expect("skeleton");

        assert_eq!(params.len(), 1);
        let profile_json = params["profile"].as_str().expect("serialized");
        let decoded: Value = serde_json::from_str(profile_json).expect("json");
        assert_eq!(decoded, json!({"firstName": "Ann"}));
    }

    #[test]
    fn test_setter_params_through_arrays_and_missing_keys() {
        let cursor = bound(json!({"data": {"tags": ["a", "b"]}}), "getAccountInfo");
        let tags = cursor_at(&cursor_at(&cursor, "data"), "tags");
        let params = tags.setter_params(&Field::new("1"), json!("z")).expect("skeleton");
        let decoded: Value = serde_json::from_str(params["data"].as_str().expect("text")).expect("json");
        assert_eq!(decoded, json!({"tags": ["a", "z"]}));

        let missing = cursor_at(&cursor, "prefs");
        let params = missing.setter_params(&Field::new("terms"), json!(true)).expect("skeleton");
        let decoded: Value = serde_json::from_str(params["prefs"].as_str().expect("text")).expect("json");
        assert_eq!(decoded, json!({"terms": true}));
    }

    #[test]
    fn test_setter_at_top_level_sends_scalar() {
        let cursor = bound(json!({"profile": {}}), "getAccountInfo");
        let params = cursor.setter_params(&Field::literal("isActive"), json!(false)).expect("skeleton");
        assert_eq!(params["isActive"], json!(false));
    }

    #[test]
    fn test_unbound_without_area() {
        let (connection, _) = mock_connection(ConnectionConfig::builder("key").build());
        let err = connection.proxy().navigate("x").unwrap_err();
        assert!(matches!(err, ClientError::UnboundProxy { .. }));
    }
}
