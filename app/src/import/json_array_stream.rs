use std::io::{BufReader, Bytes, Read};

use serde_json::Value;

use super::error::ImportError;

/// A byte source with one-byte pushback, needed because a bare `Bytes`
/// iterator can't un-consume the delimiter that ends a scalar token.
struct ByteSource<R: Read> {
    bytes: Bytes<BufReader<R>>,
    pending: Option<u8>,
}

impl<R: Read> ByteSource<R> {
    fn new(reader: R) -> Self {
        Self {
            bytes: BufReader::new(reader).bytes(),
            pending: None,
        }
    }

    fn next(&mut self) -> Result<Option<u8>, ImportError> {
        if let Some(b) = self.pending.take() {
            return Ok(Some(b));
        }
        match self.bytes.next() {
            Some(Ok(b)) => Ok(Some(b)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    fn push_back(&mut self, b: u8) {
        debug_assert!(self.pending.is_none());
        self.pending = Some(b);
    }

    fn next_non_ws(&mut self) -> Result<Option<u8>, ImportError> {
        loop {
            match self.next()? {
                Some(b) if b.is_ascii_whitespace() => continue,
                other => return Ok(other),
            }
        }
    }
}

/// Pulls one JSON value at a time out of a top-level `[ ... ]` array without
/// ever holding the whole array (or even a whole element's siblings) in
/// memory — only the bytes of the element currently being read. That keeps
/// the pipeline's memory ceiling independent of channel-day file size.
pub struct JsonArrayReader<R: Read> {
    src: ByteSource<R>,
    started: bool,
    finished: bool,
}

impl<R: Read> JsonArrayReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            src: ByteSource::new(reader),
            started: false,
            finished: false,
        }
    }

    pub fn next_value(&mut self) -> Result<Option<Value>, ImportError> {
        if self.finished {
            return Ok(None);
        }

        if !self.started {
            match self.src.next_non_ws()? {
                Some(b'[') => self.started = true,
                Some(other) => {
                    return Err(ImportError::Other(format!(
                        "expected '[' to start a streamed json array, found byte {other}"
                    )))
                }
                None => {
                    self.finished = true;
                    return Ok(None);
                }
            }
        } else {
            match self.src.next_non_ws()? {
                Some(b',') => {}
                Some(b']') => {
                    self.finished = true;
                    return Ok(None);
                }
                Some(other) => {
                    return Err(ImportError::Other(format!(
                        "expected ',' or ']' between array elements, found byte {other}"
                    )))
                }
                None => {
                    self.finished = true;
                    return Ok(None);
                }
            }
        }

        match self.src.next_non_ws()? {
            Some(b']') => {
                // empty array, or a trailing comma before the closing bracket
                self.finished = true;
                Ok(None)
            }
            Some(first) => {
                let raw = self.read_value_bytes(first)?;
                let value = serde_json::from_slice(&raw)?;
                Ok(Some(value))
            }
            None => {
                self.finished = true;
                Ok(None)
            }
        }
    }

    fn read_value_bytes(&mut self, first: u8) -> Result<Vec<u8>, ImportError> {
        let mut buf = vec![first];
        match first {
            b'{' | b'[' => {
                let mut depth = 1i32;
                let mut in_string = false;
                let mut escaped = false;
                while depth > 0 {
                    let Some(b) = self.src.next()? else {
                        return Err(ImportError::Other("unexpected eof inside json value".into()));
                    };
                    buf.push(b);
                    if in_string {
                        if escaped {
                            escaped = false;
                        } else if b == b'\\' {
                            escaped = true;
                        } else if b == b'"' {
                            in_string = false;
                        }
                        continue;
                    }
                    match b {
                        b'"' => in_string = true,
                        b'{' | b'[' => depth += 1,
                        b'}' | b']' => depth -= 1,
                        _ => {}
                    }
                }
            }
            b'"' => {
                let mut escaped = false;
                loop {
                    let Some(b) = self.src.next()? else {
                        return Err(ImportError::Other("unexpected eof inside json string".into()));
                    };
                    buf.push(b);
                    if escaped {
                        escaped = false;
                    } else if b == b'\\' {
                        escaped = true;
                    } else if b == b'"' {
                        break;
                    }
                }
            }
            _ => loop {
                match self.src.next()? {
                    Some(b) if b == b',' || b == b']' || b == b'}' || b.is_ascii_whitespace() => {
                        self.src.push_back(b);
                        break;
                    }
                    Some(b) => buf.push(b),
                    None => break,
                }
            },
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn values(json: &str) -> Vec<Value> {
        let mut reader = JsonArrayReader::new(Cursor::new(json.as_bytes().to_vec()));
        let mut out = Vec::new();
        while let Some(v) = reader.next_value().unwrap() {
            out.push(v);
        }
        out
    }

    #[test]
    fn reads_simple_array() {
        let got = values(r#"[{"a":1},{"a":2}]"#);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0]["a"], 1);
        assert_eq!(got[1]["a"], 2);
    }

    #[test]
    fn handles_whitespace_and_nesting() {
        let got = values(
            r#"
            [
              {"ts": "1.0", "blocks": [{"type": "section", "text": {"a": "b, c"}}]},
              {"ts": "2.0"}
            ]
        "#,
        );
        assert_eq!(got.len(), 2);
        assert_eq!(got[0]["ts"], "1.0");
    }

    #[test]
    fn handles_escaped_quotes_in_strings() {
        let got = values(r#"[{"text": "he said \"hi, there\""}]"#);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0]["text"], "he said \"hi, there\"");
    }

    #[test]
    fn empty_array_yields_nothing() {
        assert!(values("[]").is_empty());
        assert!(values("  [  ]  ").is_empty());
    }

    #[test]
    fn scalars_in_array_are_parsed() {
        let mut reader = JsonArrayReader::new(Cursor::new(b"[1, true, null, \"x\"]".to_vec()));
        let mut out = Vec::new();
        while let Some(v) = reader.next_value().unwrap() {
            out.push(v);
        }
        assert_eq!(out, vec![Value::from(1), Value::from(true), Value::Null, Value::from("x")]);
    }
}
