//! PDF text extraction with a hard size cap and panic recovery, matching
//! the original's `extractPDFText` (size check on both declared and
//! observed length, `%PDF-` magic check, `recover()`-guarded parse).

pub fn extract_pdf_text(data: &[u8], max_bytes: usize) -> Result<String, String> {
    if data.len() > max_bytes {
        return Err(format!("pdf too large: {} bytes", data.len()));
    }
    if !data.starts_with(b"%PDF-") {
        return Err("response is not a PDF (no %PDF- header)".to_string());
    }

    let owned = data.to_vec();
    let result = std::panic::catch_unwind(move || pdf_extract::extract_text_from_mem(&owned));
    match result {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(format!("pdf extract: {e}")),
        Err(_) => Err("pdf parse panic".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_oversized_input() {
        let data = vec![b'%'; 10];
        let err = extract_pdf_text(&data, 5).unwrap_err();
        assert!(err.contains("too large"));
    }

    #[test]
    fn rejects_missing_magic_bytes() {
        let err = extract_pdf_text(b"not a pdf", 1024).unwrap_err();
        assert!(err.contains("%PDF-"));
    }
}
