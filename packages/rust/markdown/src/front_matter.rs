//! YAML front matter (`---` fenced block at the top of a file).

use serde_json::{Map, Value};

/// A file split into its front matter and body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontMatter<'a> {
    /// Raw YAML between the fences, if the file has front matter.
    pub yaml: Option<&'a str>,
    /// Everything after the closing fence.
    pub body: &'a str,
    /// 1-based line number of the first body line.
    pub body_line: usize,
}

/// Split leading front matter off `content`.
///
/// An opening fence without a closing `---` (or `...`) line is not front
/// matter; the whole input is returned as body.
pub fn split(content: &str) -> FrontMatter<'_> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let none = FrontMatter {
        yaml: None,
        body: content,
        body_line: 1,
    };

    let mut lines = content.split_inclusive('\n');
    match lines.next() {
        Some(first) if first.trim_end() == "---" => {
            let yaml_start = first.len();
            let mut offset = yaml_start;
            let mut line_no = 1;
            for line in lines {
                line_no += 1;
                let fence = line.trim_end();
                if fence == "---" || fence == "..." {
                    return FrontMatter {
                        yaml: Some(&content[yaml_start..offset]),
                        body: &content[offset + line.len()..],
                        body_line: line_no + 1,
                    };
                }
                offset += line.len();
            }
            none
        }
        _ => none,
    }
}

/// Parse front matter YAML into a JSON object.
///
/// Empty front matter is an empty object; anything but a mapping is an error.
pub fn parse(yaml: &str) -> Result<Map<String, Value>, String> {
    if yaml.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_yaml::from_str::<Value>(yaml) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(other) => Err(format!("front matter must be a mapping, found {}", kind_of(&other))),
        Err(e) => Err(e.to_string()),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
