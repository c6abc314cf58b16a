use anyhow::{Result, bail, ensure};

/// The record format shared by commits and annotated tags.
///
/// A header block of `key value` lines, then one blank line, then a
/// free-form message. A value may span lines: on the wire every internal
/// newline is followed by a single space (a continuation line). The same
/// key may repeat (a merge commit has several `parent` lines), and key
/// order is significant, so the fields live in an ordered list rather
/// than a map.
pub struct Kvlm {
    pub fields: Vec<(Vec<u8>, Vec<Vec<u8>>)>,
    pub body: Vec<u8>,
}

impl Kvlm {
    pub fn new() -> Kvlm {
        Kvlm {
            fields: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn parse(raw: &[u8]) -> Result<Kvlm> {
        let mut kvlm = Kvlm::new();
        let mut pos = 0;
        loop {
            let spc = find_byte(raw, pos, b' ');
            let nl = find_byte(raw, pos, b'\n');
            // a newline before any space means the header block is over
            let header_done = match (spc, nl) {
                (None, _) => true,
                (Some(s), Some(n)) => n < s,
                (Some(_), None) => false,
            };
            if header_done {
                ensure!(
                    nl == Some(pos),
                    "record header block does not end with a blank line"
                );
                kvlm.body = raw[pos + 1..].to_vec();
                return Ok(kvlm);
            }
            let spc = spc.unwrap();
            let key = raw[pos..spc].to_vec();
            // the value runs to the first newline not followed by a space
            let mut end = spc;
            loop {
                let Some(next) = find_byte(raw, end + 1, b'\n') else {
                    bail!("unterminated header value for key {:?}", key);
                };
                end = next;
                if raw.get(end + 1) != Some(&b' ') {
                    break;
                }
            }
            let value = unescape_continuations(&raw[spc + 1..end]);
            kvlm.push(&key, value);
            pos = end + 1;
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (key, values) in &self.fields {
            for value in values {
                out.extend_from_slice(key);
                out.push(b' ');
                for &byte in value {
                    out.push(byte);
                    if byte == b'\n' {
                        out.push(b' ');
                    }
                }
                out.push(b'\n');
            }
        }
        out.push(b'\n');
        out.extend_from_slice(&self.body);
        out
    }

    /// Append a value, extending the existing entry when the key repeats.
    pub fn push(&mut self, key: &[u8], value: Vec<u8>) {
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some((_, values)) => values.push(value),
            None => self.fields.push((key.to_vec(), vec![value])),
        }
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, values)| values.first())
            .map(|value| value.as_slice())
    }

    /// Every value stored under `key`, empty when absent.
    pub fn get_all(&self, key: &[u8]) -> &[Vec<u8>] {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }
}

fn find_byte(haystack: &[u8], from: usize, byte: u8) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .iter()
        .position(|&b| b == byte)
        .map(|i| from + i)
}

fn unescape_continuations(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'\n' && raw.get(i + 1) == Some(&b' ') {
            out.push(b'\n');
            i += 2;
        } else {
            out.push(raw[i]);
            i += 1;
        }
    }
    out
}
