//! Vendor responses and content-type driven body parsing.

// crates.io
use oauth2::http::{HeaderMap, header::CONTENT_TYPE};
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, http::HttpResponse};

/// Parsed response body.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseBody {
	/// JSON-family content type.
	Json(Value),
	/// Anything else, decoded lossily as UTF-8.
	Text(String),
}
impl ResponseBody {
	/// Returns the JSON document, if the body was JSON.
	pub fn as_json(&self) -> Option<&Value> {
		match self {
			Self::Json(value) => Some(value),
			Self::Text(_) => None,
		}
	}

	/// Converts into a JSON value; text bodies become JSON strings.
	pub fn into_json(self) -> Value {
		match self {
			Self::Json(value) => value,
			Self::Text(text) => Value::String(text),
		}
	}
}

/// Unparsed successful response.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw body bytes.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Returns the declared content type, if any.
	pub fn content_type(&self) -> Option<&str> {
		self.headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok())
	}

	/// Returns `true` for `application/json`, `application/vnd.api+json`,
	/// `application/hal+json`, and any other `+json` media type.
	pub fn is_json(&self) -> bool {
		self.content_type().is_some_and(is_json_media_type)
	}

	/// Parses the body according to its content type.
	pub fn parse_body(&self) -> Result<ResponseBody> {
		if !self.is_json() {
			return Ok(ResponseBody::Text(self.text()));
		}
		if self.body.iter().all(u8::is_ascii_whitespace) {
			return Ok(ResponseBody::Json(Value::Null));
		}

		serde_json::from_slice(&self.body)
			.map(ResponseBody::Json)
			.map_err(|source| Error::ResponseDecode { status: self.status, source })
	}

	/// Deserializes the body as JSON regardless of the declared content type.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		serde_json::from_slice(&self.body)
			.map_err(|source| Error::ResponseDecode { status: self.status, source })
	}

	/// Decodes the body as UTF-8, replacing invalid sequences.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}
impl From<HttpResponse> for ApiResponse {
	fn from(response: HttpResponse) -> Self {
		let status = response.status().as_u16();
		let (parts, body) = response.into_parts();

		Self { status, headers: parts.headers, body }
	}
}

fn is_json_media_type(content_type: &str) -> bool {
	let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();

	essence == "application/json" || essence.ends_with("+json")
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn response(content_type: Option<&'static str>, body: &str) -> ApiResponse {
		let mut headers = HeaderMap::new();

		if let Some(value) = content_type {
			headers.insert(CONTENT_TYPE, value.parse().expect("Content type should parse."));
		}

		ApiResponse { status: 200, headers, body: body.as_bytes().to_vec() }
	}

	#[test]
	fn json_family_content_types_parse() {
		for content_type in [
			"application/json; charset=utf-8",
			"application/vnd.api+json",
			"application/hal+json",
			"application/problem+json",
		] {
			let body = response(Some(content_type), r#"{"ok":true}"#)
				.parse_body()
				.expect("JSON body should parse.");

			assert_eq!(body, ResponseBody::Json(serde_json::json!({ "ok": true })));
		}
	}

	#[test]
	fn other_content_types_are_text() {
		assert_eq!(
			response(Some("text/plain"), "{}").parse_body().expect("Text should parse."),
			ResponseBody::Text("{}".into())
		);
		assert_eq!(
			response(None, "plain").parse_body().expect("Text should parse."),
			ResponseBody::Text("plain".into())
		);
	}

	#[test]
	fn empty_json_body_is_null_and_garbage_fails() {
		assert_eq!(
			response(Some("application/json"), "").parse_body().expect("Empty body should parse."),
			ResponseBody::Json(Value::Null)
		);
		assert!(matches!(
			response(Some("application/json"), "{oops").parse_body(),
			Err(Error::ResponseDecode { status: 200, .. })
		));
	}
}
