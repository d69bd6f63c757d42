use log::trace;
use multipart::server::Multipart;
use std::io::{self, Read};
use thiserror::Error;

/// A custom error for describing the request bodies that cannot be read as a form.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("multipart body has no boundary")]
    MissingBoundary,
    #[error("cannot read multipart body: {0}")]
    UnreadableMultipart(#[from] io::Error),
}

/// The key-value pairs of a request body, in the order they were sent.
///
/// The parser is chosen by the Content-Type: `multipart/form-data` is split by its
/// boundary, urlencoded or untyped bodies are decoded as urlencoded forms and every other
/// type (for example JSON payloads of webhook providers) has no fields.
/// Invalid UTF-8 in the values is replaced, it is never a reason to reject the request.
pub fn body_fields(
    content_type: Option<&str>,
    body: &[u8],
) -> Result<Vec<(String, String)>, FormError> {
    let Some(content_type) = content_type else {
        return Ok(urlencoded_fields(body));
    };

    let mut parameters = content_type.split(';').map(str::trim);
    let mime = parameters.next().unwrap_or_default().to_ascii_lowercase();
    match mime.as_str() {
        "application/x-www-form-urlencoded" => Ok(urlencoded_fields(body)),
        "multipart/form-data" => {
            let boundary = parameters
                .find_map(|parameter| {
                    let (key, value) = parameter.split_once('=')?;
                    key.trim()
                        .eq_ignore_ascii_case("boundary")
                        .then(|| value.trim().trim_matches('"'))
                })
                .filter(|boundary| !boundary.is_empty())
                .ok_or(FormError::MissingBoundary)?;

            multipart_fields(body, boundary)
        }
        _ => {
            trace!("Body of type {mime} has no form fields.");
            Ok(vec![])
        }
    }
}

fn urlencoded_fields(body: &[u8]) -> Vec<(String, String)> {
    form_urlencoded::parse(body).into_owned().collect()
}

fn multipart_fields(body: &[u8], boundary: &str) -> Result<Vec<(String, String)>, FormError> {
    let mut multipart = Multipart::with_body(body, boundary);

    let mut fields = vec![];
    while let Some(mut field) = multipart.read_entry()? {
        let mut value = vec![];
        field.data.read_to_end(&mut value)?;
        fields.push((
            field.headers.name.to_string(),
            String::from_utf8_lossy(&value).into_owned(),
        ));
    }

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTIPART_BODY: &[u8] = b"--XyZ\r\n\
        Content-Disposition: form-data; name=\"token\"\r\n\
        \r\n\
        secret\r\n\
        --XyZ\r\n\
        Content-Disposition: form-data; name=\"slug\"\r\n\
        \r\n\
        blog\r\n\
        --XyZ--\r\n";

    fn owned(fields: &[(&str, &str)]) -> Vec<(String, String)> {
        fields
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn it_should_read_urlencoded_bodies() -> Result<(), FormError> {
        let expected = owned(&[("token", "secret"), ("slug", "my blog")]);

        assert_eq!(expected, body_fields(None, b"token=secret&slug=my+blog")?);
        assert_eq!(
            expected,
            body_fields(
                Some("application/x-www-form-urlencoded; charset=UTF-8"),
                b"token=secret&slug=my%20blog"
            )?
        );

        Ok(())
    }

    #[test]
    fn it_should_read_multipart_bodies() -> Result<(), FormError> {
        let expected = owned(&[("token", "secret"), ("slug", "blog")]);

        assert_eq!(
            expected,
            body_fields(Some("multipart/form-data; boundary=XyZ"), MULTIPART_BODY)?
        );
        assert_eq!(
            expected,
            body_fields(Some("Multipart/Form-Data; boundary=\"XyZ\""), MULTIPART_BODY)?
        );

        Ok(())
    }

    #[test]
    fn it_should_fail_on_multipart_without_boundary() {
        let result = body_fields(Some("multipart/form-data"), MULTIPART_BODY);

        assert!(
            matches!(result, Err(FormError::MissingBoundary)),
            "{result:?} should match missing boundary"
        );
    }

    #[test]
    fn it_should_replace_invalid_utf8() -> Result<(), FormError> {
        assert_eq!(
            owned(&[("token", "secret"), ("note", "\u{FFFD}")]),
            body_fields(None, b"token=secret&note=\xff")?
        );

        Ok(())
    }

    #[test]
    fn it_should_ignore_other_content_types() -> Result<(), FormError> {
        assert!(body_fields(Some("application/json"), br#"{"token":"secret"}"#)?.is_empty());

        Ok(())
    }
}
