use serde::Deserialize;

/// Which field of a node a taint/sink descriptor keys its match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accordance {
    Function,
    Attribute,
    Type,
}

/// Where in a call's arguments a descriptor's position applies: a plain
/// integer index, the literal "ret" for the call's own return value, or
/// absent (keyword-only binding).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Position {
    Index(u32),
    Return,
}

impl<'de> Deserialize<'de> for Position {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(u32),
            Str(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Int(n) => Ok(Position::Index(n)),
            Raw::Str(s) if s == "ret" => Ok(Position::Return),
            Raw::Str(s) => Err(serde::de::Error::custom(format!(
                "invalid position: expected an integer or \"ret\", got {s:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaintDescriptor {
    pub accordance: Accordance,
    #[serde(default)]
    pub function: Option<String>,
    #[serde(default)]
    pub attribute: Option<String>,
    #[serde(default, rename = "type")]
    pub type_: Option<String>,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub severity: u8,
    #[serde(default)]
    pub confidence: u8,
}

impl TaintDescriptor {
    /// The matching key this descriptor keys into `RuleSet`'s indexes.
    pub fn key(&self) -> Option<&str> {
        match self.accordance {
            Accordance::Function => self.function.as_deref(),
            Accordance::Attribute => self.attribute.as_deref(),
            Accordance::Type => self.type_.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SinkDescriptor {
    pub accordance: Accordance,
    #[serde(default)]
    pub function: String,
    #[serde(default, rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub severity: u8,
    #[serde(default)]
    pub confidence: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub severity: u8,
    #[serde(default)]
    pub confidence: u8,
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub taints: Vec<TaintDescriptor>,
    #[serde(default)]
    pub sinks: Vec<SinkDescriptor>,
}

impl Rule {
    /// Rule ids beginning with "00" are taint-only classification rules,
    /// excluded from sink/issue matching.
    pub fn is_taint_only(&self) -> bool {
        self.id.starts_with("00")
    }
}
