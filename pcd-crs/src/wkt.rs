//! Minimal reader/writer for OGC WKT1 reference-system strings.
//!
//! Only the tree structure is interpreted: `KEYWORD[arg, arg, ...]` where an
//! argument is a quoted string, a number, a bare identifier (`EAST`) or a
//! nested node. Both `[]` and `()` delimiters are accepted on input; output
//! always uses `[]`.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum WktError {
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("unexpected character '{found}' at byte {position}")]
    UnexpectedChar { found: char, position: usize },
    #[error("trailing content at byte {0}")]
    TrailingContent(usize),
    #[error("empty keyword at byte {0}")]
    EmptyKeyword(usize),
    #[error("nodes nested deeper than {0} levels")]
    TooDeep(usize),
}

// Real WKT1 definitions nest five or six levels.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum WktValue {
    Text(String),
    Number(f64),
    Identifier(String),
    Node(WktNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WktNode {
    pub keyword: String,
    pub args: Vec<WktValue>,
}

impl WktNode {
    /// The first quoted argument, which WKT1 uses as the object name.
    pub fn name(&self) -> Option<&str> {
        self.args.iter().find_map(|arg| match arg {
            WktValue::Text(text) => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn children(&self) -> impl Iterator<Item = &WktNode> {
        self.args.iter().filter_map(|arg| match arg {
            WktValue::Node(node) => Some(node),
            _ => None,
        })
    }

    pub fn child(&self, keyword: &str) -> Option<&WktNode> {
        self.children()
            .find(|node| node.keyword.eq_ignore_ascii_case(keyword))
    }

    /// `AUTHORITY["EPSG","26917"]` (or the WKT2 `ID["EPSG",26917]`) directly
    /// under this node, as `("EPSG", "26917")`.
    pub fn authority(&self) -> Option<(&str, String)> {
        let authority = self.child("AUTHORITY").or_else(|| self.child("ID"))?;
        let mut args = authority.args.iter();
        let name = match args.next()? {
            WktValue::Text(name) => name.as_str(),
            _ => return None,
        };
        let code = match args.next()? {
            WktValue::Text(code) => code.trim().to_string(),
            WktValue::Number(code) => format!("{code}"),
            _ => return None,
        };
        Some((name, code))
    }
}

impl fmt::Display for WktNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.keyword)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            match arg {
                WktValue::Text(text) => write!(f, "\"{}\"", text.replace('"', "\"\""))?,
                WktValue::Number(n) => write!(f, "{n}")?,
                WktValue::Identifier(ident) => write!(f, "{ident}")?,
                WktValue::Node(node) => write!(f, "{node}")?,
            }
        }
        write!(f, "]")
    }
}

/// Parses a complete WKT string. Trailing NUL padding and whitespace, as found
/// in LAS records, are ignored.
pub fn parse(input: &str) -> Result<WktNode, WktError> {
    let trimmed = input.trim_end_matches(['\0', ' ', '\n', '\r', '\t']);
    let mut parser = Parser {
        src: trimmed,
        pos: 0,
        depth: 0,
    };
    parser.skip_whitespace();
    let node = parser.node()?;
    parser.skip_whitespace();
    if parser.pos < parser.src.len() {
        return Err(WktError::TrailingContent(parser.pos));
    }
    Ok(node)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn expect_any(&mut self, expected: &[char]) -> Result<char, WktError> {
        self.skip_whitespace();
        let position = self.pos;
        match self.bump() {
            Some(c) if expected.contains(&c) => Ok(c),
            Some(found) => Err(WktError::UnexpectedChar { found, position }),
            None => Err(WktError::UnexpectedEnd),
        }
    }

    fn word(&mut self) -> &str {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn node(&mut self) -> Result<WktNode, WktError> {
        if self.depth == MAX_DEPTH {
            return Err(WktError::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        let node = self.node_body();
        self.depth -= 1;
        node
    }

    fn node_body(&mut self) -> Result<WktNode, WktError> {
        let start = self.pos;
        let keyword = self.word().to_string();
        if keyword.is_empty() {
            return match self.peek() {
                Some(found) => Err(WktError::UnexpectedChar {
                    found,
                    position: start,
                }),
                None => Err(WktError::EmptyKeyword(start)),
            };
        }
        let open = self.expect_any(&['[', '('])?;
        let close = if open == '[' { ']' } else { ')' };

        let mut args = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some(close) && args.is_empty() {
                self.bump();
                break;
            }
            args.push(self.value()?);
            match self.expect_any(&[',', close])? {
                ',' => continue,
                _ => break,
            }
        }

        Ok(WktNode { keyword, args })
    }

    fn value(&mut self) -> Result<WktValue, WktError> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(WktError::UnexpectedEnd),
            Some('"') => self.text().map(WktValue::Text),
            Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.number(),
            Some(c) if c.is_ascii_alphabetic() => {
                let checkpoint = self.pos;
                let ident = self.word().to_string();
                self.skip_whitespace();
                if matches!(self.peek(), Some('[') | Some('(')) {
                    self.pos = checkpoint;
                    self.node().map(WktValue::Node)
                } else {
                    Ok(WktValue::Identifier(ident))
                }
            }
            Some(found) => Err(WktError::UnexpectedChar {
                found,
                position: self.pos,
            }),
        }
    }

    fn text(&mut self) -> Result<String, WktError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(WktError::UnexpectedEnd),
                Some('"') if self.peek() == Some('"') => {
                    self.bump();
                    out.push('"');
                }
                Some('"') => return Ok(out),
                Some(c) => out.push(c),
            }
        }
    }

    fn number(&mut self) -> Result<WktValue, WktError> {
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')
        ) {
            self.bump();
        }
        self.src[start..self.pos]
            .parse::<f64>()
            .map(WktValue::Number)
            .map_err(|_| WktError::UnexpectedChar {
                found: self.src[start..].chars().next().unwrap_or('?'),
                position: start,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UTM17: &str = r#"PROJCS["NAD83 / UTM zone 17N",GEOGCS["NAD83",DATUM["North_American_Datum_1983",SPHEROID["GRS 1980",6378137,298.257222101]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],PARAMETER["central_meridian",-81],UNIT["metre",1],AXIS["Easting",EAST],AXIS["Northing",NORTH],AUTHORITY["EPSG","26917"]]"#;

    #[test]
    fn parses_nested_projected_crs() {
        let root = parse(UTM17).unwrap();
        assert_eq!(root.keyword, "PROJCS");
        assert_eq!(root.name(), Some("NAD83 / UTM zone 17N"));
        assert_eq!(root.authority(), Some(("EPSG", "26917".to_string())));

        let geogcs = root.child("GEOGCS").unwrap();
        assert_eq!(geogcs.name(), Some("NAD83"));
        assert_eq!(geogcs.authority(), None);

        let axis = root.children().filter(|n| n.keyword == "AXIS").nth(1).unwrap();
        assert_eq!(axis.args[1], WktValue::Identifier("NORTH".to_string()));
    }

    #[test]
    fn display_round_trips_structure() {
        let root = parse(UTM17).unwrap();
        let again = parse(&root.to_string()).unwrap();
        assert_eq!(root, again);
    }

    #[test]
    fn accepts_parentheses_whitespace_and_nul_padding() {
        let root = parse("GEOGCS ( \"WGS 84\" , AUTHORITY(\"EPSG\", 4326) )\0\0").unwrap();
        assert_eq!(root.name(), Some("WGS 84"));
        assert_eq!(root.authority(), Some(("EPSG", "4326".to_string())));

        let root = parse("GEOGCRS[\"WGS 84\",ID[\"EPSG\",4326]]").unwrap();
        assert_eq!(root.authority(), Some(("EPSG", "4326".to_string())));
    }

    #[test]
    fn escaped_quotes_are_unescaped() {
        let root = parse(r#"GEOGCS["a ""quoted"" name"]"#).unwrap();
        assert_eq!(root.name(), Some(r#"a "quoted" name"#));
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(parse("PROJCS[\"x\""), Err(WktError::UnexpectedEnd));
        assert!(matches!(
            parse("not wkt at all"),
            Err(WktError::UnexpectedChar { .. })
        ));
        assert!(matches!(
            parse("GEOGCS[\"a\"] extra"),
            Err(WktError::TrailingContent(_))
        ));
        assert_eq!(parse(""), Err(WktError::EmptyKeyword(0)));
    }

    #[test]
    fn nesting_depth_is_bounded() {
        let nested = |depth: usize| format!("{}{}", "A[".repeat(depth), "]".repeat(depth));
        assert!(parse(&nested(MAX_DEPTH)).is_ok());
        assert_eq!(parse(&nested(MAX_DEPTH + 1)), Err(WktError::TooDeep(MAX_DEPTH)));

        // would overflow the stack without the bound
        let text = nested(20_000);
        let result = std::thread::Builder::new()
            .stack_size(1024 * 1024)
            .spawn(move || parse(&text))
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(result, Err(WktError::TooDeep(MAX_DEPTH)));
    }
}
