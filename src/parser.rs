//! Splitting of an input line into pipeline stages.

/// Marker carried as the last element of a raw split for background pipelines.
pub const BACKGROUND_MARKER: &str = "&";
/// Marker carried as the last element of a raw split for foreground pipelines.
pub const FOREGROUND_MARKER: &str = "-";

/// Splits `line` at every unquoted `|` or `;`.
///
/// Both separators end the current stage the same way, so a `;`-separated command
/// is still chained to the previous one. Double-quoted spans are skipped. Any
/// unquoted `&` marks the whole line as a background pipeline without ending a
/// stage. The returned vector always ends with [`BACKGROUND_MARKER`] or
/// [`FOREGROUND_MARKER`].
///
/// Stages are returned untrimmed: `ls | wc -l` gives `"ls "` and `" wc -l"`.
pub fn split_by_pipe(line: &str) -> Vec<String> {
    let bytes = line.as_bytes();
    let mut output = Vec::new();
    let mut background = false;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'&' => background = true,
            b'|' | b';' => {
                output.push(line[start..i].to_string());
                start = i + 1;
            }
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }

    if start < bytes.len() {
        output.push(line[start..].to_string());
    }

    output.push(
        if background {
            BACKGROUND_MARKER
        } else {
            FOREGROUND_MARKER
        }
        .to_string(),
    );
    output
}

/// Removes every unquoted `&` that stands alone as a word, with the space after it.
///
/// A quoted `"&"` is an ordinary argument and is kept, as is an `&` glued to other
/// characters.
pub fn strip_background_marker(stage: &str) -> String {
    let bytes = stage.as_bytes();
    let mut output = String::with_capacity(stage.len());
    let mut quoted = false;
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => quoted = !quoted,
            b'&' if !quoted => {
                let alone_before = i == 0 || bytes[i - 1] == b' ';
                let alone_after = i + 1 == bytes.len() || bytes[i + 1] == b' ';
                if alone_before && alone_after {
                    output.push_str(&stage[copied..i]);
                    i = (i + 2).min(bytes.len());
                    copied = i;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }

    output.push_str(&stage[copied..]);
    output
}

/// Ordered stages of one input line plus the background flag for the whole line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageList {
    stages: Vec<String>,
    background: bool,
}

impl StageList {
    /// Split and interpret `line`. Returns `None` when the line holds no stage.
    pub fn parse(line: &str) -> Option<Self> {
        Self::from_split(split_by_pipe(line))
    }

    /// Pops the marker off a raw split and interprets it.
    pub fn from_split(mut raw: Vec<String>) -> Option<Self> {
        let marker = raw.pop()?;
        if raw.is_empty() {
            return None;
        }
        Some(Self {
            stages: raw,
            background: marker == BACKGROUND_MARKER,
        })
    }

    pub fn stages(&self) -> &[String] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn is_background(&self) -> bool {
        self.background
    }
}
