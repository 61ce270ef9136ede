// ============================================
// Interest Hierarchy Index (興味関心ツリー)
// ============================================
//
// Read-only view of the three-level taxonomy:
//   category → subcategory → tag
//
// Every tag has exactly one subcategory parent and every subcategory
// exactly one category parent, so a tag's category is always its
// subcategory's category.

mod keyword_clusters;

pub use keyword_clusters::KeywordClusters;

use crate::error::TaxonomyError;
use crate::models::{DeclaredInterest, InterestLevel, InterestNode, InterestPath, InterestSelection};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type Result<T> = std::result::Result<T, TaxonomyError>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterestHierarchyIndex {
    nodes: HashMap<String, InterestNode>,
}

impl InterestHierarchyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from a flat node list; parents must precede children
    pub fn from_nodes(nodes: Vec<InterestNode>) -> Result<Self> {
        let mut index = Self::new();
        for node in nodes {
            match (node.level, node.parent) {
                (InterestLevel::Category, _) => index.add_category(&node.id, &node.name)?,
                (level, Some(parent)) => index.insert(&node.id, &node.name, level, &parent)?,
                (_, None) => {
                    return Err(TaxonomyError::InvalidParent {
                        child: node.id,
                        parent: String::new(),
                        expected: "non-empty",
                    })
                }
            }
        }
        Ok(index)
    }

    pub fn add_category(&mut self, id: &str, name: &str) -> Result<()> {
        self.ensure_new(id)?;
        self.nodes.insert(
            id.to_string(),
            InterestNode {
                id: id.to_string(),
                name: name.to_string(),
                level: InterestLevel::Category,
                parent: None,
            },
        );
        Ok(())
    }

    pub fn add_subcategory(&mut self, id: &str, name: &str, category_id: &str) -> Result<()> {
        self.insert(id, name, InterestLevel::Subcategory, category_id)
    }

    pub fn add_tag(&mut self, id: &str, name: &str, subcategory_id: &str) -> Result<()> {
        self.insert(id, name, InterestLevel::Tag, subcategory_id)
    }

    fn insert(&mut self, id: &str, name: &str, level: InterestLevel, parent_id: &str) -> Result<()> {
        self.ensure_new(id)?;

        let expected = match level {
            InterestLevel::Subcategory => InterestLevel::Category,
            InterestLevel::Tag => InterestLevel::Subcategory,
            InterestLevel::Category => {
                return Err(TaxonomyError::InvalidParent {
                    child: id.to_string(),
                    parent: parent_id.to_string(),
                    expected: "no",
                })
            }
        };

        let parent = self.node(parent_id)?;
        if parent.level != expected {
            return Err(TaxonomyError::InvalidParent {
                child: id.to_string(),
                parent: parent_id.to_string(),
                expected: expected.as_str(),
            });
        }

        self.nodes.insert(
            id.to_string(),
            InterestNode {
                id: id.to_string(),
                name: name.to_string(),
                level,
                parent: Some(parent_id.to_string()),
            },
        );
        Ok(())
    }

    fn ensure_new(&self, id: &str) -> Result<()> {
        if self.nodes.contains_key(id) {
            Err(TaxonomyError::DuplicateNode(id.to_string()))
        } else {
            Ok(())
        }
    }

    pub fn node(&self, id: &str) -> Result<&InterestNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| TaxonomyError::UnknownNode(id.to_string()))
    }

    pub fn name(&self, id: &str) -> Option<&str> {
        self.nodes.get(id).map(|n| n.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Walk up from a node to build its full path
    pub fn path(&self, id: &str) -> Result<InterestPath> {
        let node = self.node(id)?;
        match node.level {
            InterestLevel::Category => Ok(InterestPath {
                category: node.id.clone(),
                subcategory: None,
                tag: None,
            }),
            InterestLevel::Subcategory => {
                let category = self.parent_of(node)?;
                Ok(InterestPath {
                    category: category.id.clone(),
                    subcategory: Some(node.id.clone()),
                    tag: None,
                })
            }
            InterestLevel::Tag => {
                let subcategory = self.parent_of(node)?;
                let category = self.parent_of(subcategory)?;
                Ok(InterestPath {
                    category: category.id.clone(),
                    subcategory: Some(subcategory.id.clone()),
                    tag: Some(node.id.clone()),
                })
            }
        }
    }

    fn parent_of(&self, node: &InterestNode) -> Result<&InterestNode> {
        let parent_id = node
            .parent
            .as_deref()
            .ok_or_else(|| TaxonomyError::UnknownNode(format!("parent of {}", node.id)))?;
        self.node(parent_id)
    }

    /// Create a user selection for a node, validating intensity (1-5)
    pub fn select(&self, node_id: &str, intensity: u8) -> Result<InterestSelection> {
        if !(1..=5).contains(&intensity) {
            return Err(TaxonomyError::InvalidIntensity(intensity));
        }
        let node = self.node(node_id)?;
        Ok(InterestSelection {
            node_id: node.id.clone(),
            level: node.level,
            path: self.path(node_id)?,
            intensity,
        })
    }

    /// Resolve a group's declared interest at ingestion time
    pub fn declare(&self, node_id: &str) -> Result<DeclaredInterest> {
        let node = self.node(node_id)?;
        Ok(DeclaredInterest::Resolved {
            path: self.path(node_id)?,
            name: node.name.clone(),
        })
    }

    /// Resolve a free-text interest name if it matches a node, otherwise keep it as legacy text
    pub fn declare_by_name(&self, name: &str) -> DeclaredInterest {
        let needle = name.trim().to_lowercase();
        let mut matches: Vec<&InterestNode> = self
            .nodes
            .values()
            .filter(|n| n.name.to_lowercase() == needle)
            .collect();
        // prefer the most specific node, then the smallest id
        matches.sort_by(|a, b| b.level.cmp(&a.level).then_with(|| a.id.cmp(&b.id)));

        match matches.first().and_then(|n| self.path(&n.id).ok().map(|p| (n, p))) {
            Some((node, path)) => DeclaredInterest::Resolved {
                path,
                name: node.name.clone(),
            },
            None => DeclaredInterest::Unresolved {
                name: name.to_string(),
            },
        }
    }

    /// Every name on a selection's path, lowercased (used by name fallback)
    pub fn path_names(&self, path: &InterestPath) -> Vec<String> {
        [Some(&path.category), path.subcategory.as_ref(), path.tag.as_ref()]
            .into_iter()
            .flatten()
            .filter_map(|id| self.name(id))
            .map(|n| n.to_lowercase())
            .collect()
    }
}
