//! Boundary extraction and MIME part header parsing.
//!
//! Both functions here are pure: they take borrowed input and either
//! return an owned value or a [`BoundaryError`], with no side effects on
//! the receive state machine beyond the two fields [`parse_part_header`]
//! is documented to set.

use crate::error::BoundaryError;
use crate::recv_fsm::RecvFsm;

/// Extracts the multipart boundary from the value of a `Content-Type`
/// header.
///
/// Splits on `;`, trims each segment, and requires the first segment to
/// case-insensitively equal `multipart/form-data` and some later segment
/// to match `boundary=<value>`. The boundary is returned verbatim;
/// later comparisons against body lines are substring matches, not
/// exact ones.
///
/// # Errors
/// Returns [`BoundaryError::NotMultipart`] if the first segment is not
/// `multipart/form-data`, or [`BoundaryError::MissingBoundary`] if no
/// segment supplies a `boundary=` parameter.
pub fn extract_boundary(content_type: &str) -> Result<String, BoundaryError> {
    let mut segments = content_type.split(';').map(str::trim);

    let media_type = segments.next().ok_or(BoundaryError::NotMultipart)?;
    if !media_type.eq_ignore_ascii_case("multipart/form-data") {
        return Err(BoundaryError::NotMultipart);
    }

    for segment in segments {
        if let Some(value) = segment.strip_prefix("boundary=").or_else(|| {
            // tolerate `Boundary=` and stray whitespace around the `=`
            segment.split_once('=').and_then(|(k, v)| k.trim().eq_ignore_ascii_case("boundary").then_some(v))
        }) {
            return Ok(value.to_owned());
        }
    }

    Err(BoundaryError::MissingBoundary)
}

/// Parses one MIME part header line of the form `Name: params`.
///
/// Only `Content-Disposition` is meaningful; every other header name is
/// ignored. On a `Content-Disposition` line, sets `fsm.input_name` from
/// the `name="…"` parameter, and additionally `fsm.file_name` from
/// `filename="…"` when `input_name == "file"`.
///
/// # Errors
/// Returns [`BoundaryError::MalformedDisposition`] if the first parameter
/// is not (case-insensitively) `form-data`, [`BoundaryError::MissingName`]
/// if no `name="…"` parameter is present, [`BoundaryError::MissingFilename`]
/// if the part is named `file` but carries no `filename="…"`, or
/// [`BoundaryError::UnterminatedQuote`] if a quoted value has no closing
/// quote.
pub fn parse_part_header(line: &str, fsm: &mut RecvFsm) -> Result<(), BoundaryError> {
    let Some((name, params)) = line.split_once(':') else {
        // Header lines without a colon carry no information we act on.
        return Ok(());
    };

    if !name.trim().eq_ignore_ascii_case("Content-Disposition") {
        return Ok(());
    }

    let mut parts = params.split(';').map(str::trim);

    let disposition_type = parts.next().ok_or(BoundaryError::MissingName)?;
    if !disposition_type.eq_ignore_ascii_case("form-data") {
        return Err(BoundaryError::MalformedDisposition);
    }

    let mut field_name = None;
    let mut filename = None;
    for part in parts {
        if let Some(value) = part.strip_prefix("name=") {
            field_name = Some(extract_quoted(value)?);
        } else if let Some(value) = part.strip_prefix("filename=") {
            filename = Some(extract_quoted(value)?);
        }
    }

    let field_name = field_name.ok_or(BoundaryError::MissingName)?;

    if field_name == "file" {
        fsm.file_name = Some(filename.ok_or(BoundaryError::MissingFilename)?);
    }
    fsm.input_name = Some(field_name);

    Ok(())
}

/// Extracts a quoted value: finds the first and last `"` and returns what
/// is between them. Fails if they coincide (fewer than two quotes, or the
/// same quote counted twice).
fn extract_quoted(value: &str) -> Result<String, BoundaryError> {
    let first = value.find('"').ok_or(BoundaryError::UnterminatedQuote)?;
    let last = value.rfind('"').ok_or(BoundaryError::UnterminatedQuote)?;
    if first == last {
        return Err(BoundaryError::UnterminatedQuote);
    }
    Ok(value[first + 1..last].to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_simple_boundary() {
        let ct = "multipart/form-data; boundary=X";
        assert_eq!(extract_boundary(ct).unwrap(), "X");
    }

    #[test]
    fn extracts_boundary_with_extra_params() {
        let ct = "multipart/form-data ; charset=utf-8 ; boundary=----abc123";
        assert_eq!(extract_boundary(ct).unwrap(), "----abc123");
    }

    #[test]
    fn rejects_non_multipart() {
        let ct = "application/json; boundary=X";
        assert!(matches!(extract_boundary(ct), Err(BoundaryError::NotMultipart)));
    }

    #[test]
    fn rejects_missing_boundary() {
        let ct = "multipart/form-data; charset=utf-8";
        assert!(matches!(extract_boundary(ct), Err(BoundaryError::MissingBoundary)));
    }

    #[test]
    fn parses_field_disposition() {
        let mut fsm = RecvFsm::for_test("X");
        parse_part_header("Content-Disposition: form-data; name=\"parent_dir\"", &mut fsm).unwrap();
        assert_eq!(fsm.input_name.as_deref(), Some("parent_dir"));
        assert_eq!(fsm.file_name, None);
    }

    #[test]
    fn parses_file_disposition() {
        let mut fsm = RecvFsm::for_test("X");
        parse_part_header(
            "Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"",
            &mut fsm,
        )
        .unwrap();
        assert_eq!(fsm.input_name.as_deref(), Some("file"));
        assert_eq!(fsm.file_name.as_deref(), Some("a.txt"));
    }

    #[test]
    fn file_part_without_filename_fails() {
        let mut fsm = RecvFsm::for_test("X");
        let err = parse_part_header("Content-Disposition: form-data; name=\"file\"", &mut fsm).unwrap_err();
        assert!(matches!(err, BoundaryError::MissingFilename));
    }

    #[test]
    fn non_disposition_headers_are_ignored() {
        let mut fsm = RecvFsm::for_test("X");
        parse_part_header("Content-Type: text/plain", &mut fsm).unwrap();
        assert_eq!(fsm.input_name, None);
    }

    #[test]
    fn malformed_disposition_type_fails() {
        let mut fsm = RecvFsm::for_test("X");
        let err = parse_part_header("Content-Disposition: attachment; name=\"x\"", &mut fsm).unwrap_err();
        assert!(matches!(err, BoundaryError::MalformedDisposition));
    }
}
