//! Content domains and their collection naming.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the three content partitions the engine indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// Source code, chunked by fixed line windows.
    Code,
    /// Project documentation, chunked by markdown sections.
    Docs,
    /// Skill documents, chunked by markdown sections with front matter.
    Skills,
}

impl Domain {
    /// All domains, in indexing order.
    pub const ALL: [Domain; 3] = [Domain::Code, Domain::Docs, Domain::Skills];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Docs => "docs",
            Self::Skills => "skills",
        }
    }

    /// Qdrant collection name for this domain, namespaced by project
    /// so multiple projects can share one server.
    pub fn collection_name(&self, project: &str) -> String {
        format!("{}-{}", project, self.as_str())
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(Self::Code),
            "docs" => Ok(Self::Docs),
            "skills" => Ok(Self::Skills),
            other => Err(anyhow::anyhow!("unknown domain: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_as_str() {
        assert_eq!(Domain::Code.as_str(), "code");
        assert_eq!(Domain::Docs.as_str(), "docs");
        assert_eq!(Domain::Skills.as_str(), "skills");
    }

    #[test]
    fn test_collection_name() {
        assert_eq!(Domain::Code.collection_name("myproj"), "myproj-code");
        assert_eq!(Domain::Skills.collection_name("x"), "x-skills");
    }

    #[test]
    fn test_from_str() {
        assert_eq!("code".parse::<Domain>().unwrap(), Domain::Code);
        assert_eq!("docs".parse::<Domain>().unwrap(), Domain::Docs);
        assert_eq!("skills".parse::<Domain>().unwrap(), Domain::Skills);
        assert!("graphs".parse::<Domain>().is_err());
    }

    #[test]
    fn test_all_order() {
        assert_eq!(Domain::ALL, [Domain::Code, Domain::Docs, Domain::Skills]);
    }
}
