// 🏷️ Category / SubCategory Entities - the chart of accounts of one business
//
// A Category belongs to exactly one business; a SubCategory belongs to exactly
// one Category and, through it, to the same business. Transactions reference
// both by id, which is why the chart may only be rebuilt while no transaction
// exists.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::catalog::ScheduleCLine;

// ============================================================================
// CATEGORY TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryType {
    /// Money coming in (Schedule C Part I)
    Income,

    /// Money going out (Schedule C Part II / Part V)
    Expense,
}

impl CategoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryType::Income => "income",
            CategoryType::Expense => "expense",
        }
    }

    pub fn parse(value: &str) -> Option<CategoryType> {
        match value {
            "income" => Some(CategoryType::Income),
            "expense" => Some(CategoryType::Expense),
            _ => None,
        }
    }
}

// ============================================================================
// CATEGORY ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,

    /// Owning business
    pub business_id: i64,

    /// Unique within the business
    pub name: String,
    pub slug: String,
    pub category_type: CategoryType,

    /// Schedule C line code ("24a"); None for user-defined categories
    pub schedule_c_line: Option<String>,
    pub report_group: String,

    /// Report visibility flags
    pub book_reports: bool,
    pub tax_reports: bool,

    pub is_active: bool,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub(crate) const COLUMNS: &'static str = "id, business_id, name, slug, category_type, \
        schedule_c_line, report_group, book_reports, tax_reports, is_active, sort_order, created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let category_type: String = row.get(4)?;
        let created_at: String = row.get(11)?;

        Ok(Category {
            id: row.get(0)?,
            business_id: row.get(1)?,
            name: row.get(2)?,
            slug: row.get(3)?,
            category_type: CategoryType::parse(&category_type).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    4,
                    rusqlite::types::Type::Text,
                    format!("unknown category type '{}'", category_type).into(),
                )
            })?,
            schedule_c_line: row.get(5)?,
            report_group: row.get(6)?,
            book_reports: row.get(7)?,
            tax_reports: row.get(8)?,
            is_active: row.get(9)?,
            sort_order: row.get(10)?,
            created_at: parse_timestamp(&created_at, 11)?,
        })
    }

    /// Parsed Schedule C line, if this category carries a known code.
    pub fn schedule_c(&self) -> Option<ScheduleCLine> {
        self.schedule_c_line.as_deref().and_then(ScheduleCLine::from_code)
    }
}

// ============================================================================
// SUBCATEGORY ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubCategory {
    pub id: i64,

    /// Always equal to the parent category's business
    pub business_id: i64,
    pub category_id: i64,

    /// Unique within the parent category
    pub name: String,
    pub slug: String,

    /// Optional override; reports fall back to the parent's line
    pub schedule_c_line: Option<String>,

    pub is_active: bool,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

impl SubCategory {
    pub(crate) const COLUMNS: &'static str =
        "id, business_id, category_id, name, slug, schedule_c_line, is_active, sort_order, created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let created_at: String = row.get(8)?;

        Ok(SubCategory {
            id: row.get(0)?,
            business_id: row.get(1)?,
            category_id: row.get(2)?,
            name: row.get(3)?,
            slug: row.get(4)?,
            schedule_c_line: row.get(5)?,
            is_active: row.get(6)?,
            sort_order: row.get(7)?,
            created_at: parse_timestamp(&created_at, 8)?,
        })
    }
}

// ============================================================================
// CHART TREE
// ============================================================================

/// A category together with its sub-categories, in display order.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryWithSubs {
    pub category: Category,
    pub subcategories: Vec<SubCategory>,
}

impl CategoryWithSubs {
    /// Tax line a sub-category reports under: its own override, else the parent's.
    pub fn effective_schedule_c_line<'a>(&'a self, sub: &'a SubCategory) -> Option<&'a str> {
        sub.schedule_c_line
            .as_deref()
            .or(self.category.schedule_c_line.as_deref())
    }
}

/// Group sub-categories under their parents, keeping the categories' order.
pub fn build_tree(categories: Vec<Category>, subcategories: Vec<SubCategory>) -> Vec<CategoryWithSubs> {
    let mut tree: Vec<CategoryWithSubs> = categories
        .into_iter()
        .map(|category| CategoryWithSubs {
            category,
            subcategories: Vec::new(),
        })
        .collect();

    for sub in subcategories {
        if let Some(node) = tree.iter_mut().find(|n| n.category.id == sub.category_id) {
            node.subcategories.push(sub);
        }
    }

    for node in &mut tree {
        node.subcategories
            .sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name)));
    }

    tree
}

pub(crate) fn parse_timestamp(value: &str, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
        })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: i64, name: &str, line: Option<&str>) -> Category {
        Category {
            id,
            business_id: 1,
            name: name.to_string(),
            slug: name.to_lowercase(),
            category_type: CategoryType::Expense,
            schedule_c_line: line.map(str::to_string),
            report_group: "Part II".to_string(),
            book_reports: true,
            tax_reports: true,
            is_active: true,
            sort_order: id,
            created_at: Utc::now(),
        }
    }

    fn subcategory(id: i64, category_id: i64, name: &str, sort_order: i64) -> SubCategory {
        SubCategory {
            id,
            business_id: 1,
            category_id,
            name: name.to_string(),
            slug: name.to_lowercase(),
            schedule_c_line: None,
            is_active: true,
            sort_order,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_category_type_round_trip() {
        assert_eq!(CategoryType::parse("income"), Some(CategoryType::Income));
        assert_eq!(CategoryType::parse(CategoryType::Expense.as_str()), Some(CategoryType::Expense));
        assert_eq!(CategoryType::parse("transfer"), None);
    }

    #[test]
    fn test_build_tree_groups_and_orders() {
        let categories = vec![category(1, "Travel", Some("24a")), category(2, "Utilities", Some("25"))];
        let subs = vec![
            subcategory(10, 1, "Lodging", 2),
            subcategory(11, 2, "Internet", 1),
            subcategory(12, 1, "Airfare", 1),
        ];

        let tree = build_tree(categories, subs);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].category.name, "Travel");
        let travel_subs: Vec<_> = tree[0].subcategories.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(travel_subs, vec!["Airfare", "Lodging"]);
        assert_eq!(tree[1].subcategories.len(), 1);
    }

    #[test]
    fn test_effective_line_falls_back_to_parent() {
        let mut sub = subcategory(10, 1, "Airfare", 1);
        let node = CategoryWithSubs {
            category: category(1, "Travel", Some("24a")),
            subcategories: vec![sub.clone()],
        };

        assert_eq!(node.effective_schedule_c_line(&sub), Some("24a"));

        sub.schedule_c_line = Some("24b".to_string());
        assert_eq!(node.effective_schedule_c_line(&sub), Some("24b"));
        assert_eq!(node.category.schedule_c(), Some(ScheduleCLine::Travel));
    }
}
