// 📒 Default Catalog - Schedule C chart of accounts as static data
//
// Ordered list of default categories, each with its default sub-categories.
// Every entry records the catalog version it first appeared in, so businesses
// seeded from an older version can be told what a re-seed would add.

use crate::entities::CategoryType;
use crate::error::{DefaultsError, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Current catalog version. Bump when entries are added.
pub const CATALOG_VERSION: u32 = 2;

// ============================================================================
// SCHEDULE C LINES
// ============================================================================

/// Schedule C line identifiers attached to default categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleCLine {
    // Part I - Income
    GrossReceipts,
    ReturnsAllowances,

    // Part II - Expenses
    Advertising,
    CarTruck,
    CommissionsFees,
    ContractLabor,
    Depletion,
    Depreciation,
    EmployeeBenefits,
    Insurance,
    InterestMortgage,
    InterestOther,
    LegalPro,
    Office,
    PensionProfitSharing,
    RentLeaseVehicles,
    RentLeaseOther,
    Repairs,
    Supplies,
    TaxesLicenses,
    Travel,
    Meals,
    Utilities,
    Wages,
    EnergyEfficientBuildings,

    // Part V - Other expenses
    OtherExpensesPartV,
}

impl ScheduleCLine {
    pub const ALL: [ScheduleCLine; 26] = [
        ScheduleCLine::GrossReceipts,
        ScheduleCLine::ReturnsAllowances,
        ScheduleCLine::Advertising,
        ScheduleCLine::CarTruck,
        ScheduleCLine::CommissionsFees,
        ScheduleCLine::ContractLabor,
        ScheduleCLine::Depletion,
        ScheduleCLine::Depreciation,
        ScheduleCLine::EmployeeBenefits,
        ScheduleCLine::Insurance,
        ScheduleCLine::InterestMortgage,
        ScheduleCLine::InterestOther,
        ScheduleCLine::LegalPro,
        ScheduleCLine::Office,
        ScheduleCLine::PensionProfitSharing,
        ScheduleCLine::RentLeaseVehicles,
        ScheduleCLine::RentLeaseOther,
        ScheduleCLine::Repairs,
        ScheduleCLine::Supplies,
        ScheduleCLine::TaxesLicenses,
        ScheduleCLine::Travel,
        ScheduleCLine::Meals,
        ScheduleCLine::Utilities,
        ScheduleCLine::Wages,
        ScheduleCLine::EnergyEfficientBuildings,
        ScheduleCLine::OtherExpensesPartV,
    ];

    /// Line code as printed on the form ("1", "16a", "27b").
    pub fn code(&self) -> &'static str {
        match self {
            ScheduleCLine::GrossReceipts => "1",
            ScheduleCLine::ReturnsAllowances => "2",
            ScheduleCLine::Advertising => "8",
            ScheduleCLine::CarTruck => "9",
            ScheduleCLine::CommissionsFees => "10",
            ScheduleCLine::ContractLabor => "11",
            ScheduleCLine::Depletion => "12",
            ScheduleCLine::Depreciation => "13",
            ScheduleCLine::EmployeeBenefits => "14",
            ScheduleCLine::Insurance => "15",
            ScheduleCLine::InterestMortgage => "16a",
            ScheduleCLine::InterestOther => "16b",
            ScheduleCLine::LegalPro => "17",
            ScheduleCLine::Office => "18",
            ScheduleCLine::PensionProfitSharing => "19",
            ScheduleCLine::RentLeaseVehicles => "20a",
            ScheduleCLine::RentLeaseOther => "20b",
            ScheduleCLine::Repairs => "21",
            ScheduleCLine::Supplies => "22",
            ScheduleCLine::TaxesLicenses => "23",
            ScheduleCLine::Travel => "24a",
            ScheduleCLine::Meals => "24b",
            ScheduleCLine::Utilities => "25",
            ScheduleCLine::Wages => "26",
            ScheduleCLine::EnergyEfficientBuildings => "27a",
            ScheduleCLine::OtherExpensesPartV => "27b",
        }
    }

    /// Form part the line is reported under.
    pub fn part(&self) -> &'static str {
        match self {
            ScheduleCLine::GrossReceipts | ScheduleCLine::ReturnsAllowances => "Part I",
            ScheduleCLine::OtherExpensesPartV => "Part V",
            _ => "Part II",
        }
    }

    /// Parse a line code, case-insensitive and whitespace tolerant.
    pub fn from_code(code: &str) -> Option<ScheduleCLine> {
        let wanted = code.trim().to_lowercase();
        Self::ALL.into_iter().find(|line| line.code() == wanted)
    }
}

// ============================================================================
// CATALOG ENTRIES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubCategorySpec {
    pub name: &'static str,

    /// Optional override of the parent's tax line
    pub schedule_c_line: Option<&'static str>,

    /// Catalog version this entry was introduced in
    pub since: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategorySpec {
    pub name: &'static str,
    pub schedule_c_line: Option<&'static str>,
    pub category_type: CategoryType,
    pub book_reports: bool,
    pub tax_reports: bool,
    pub report_group: &'static str,
    pub since: u32,
    pub subcategories: &'static [SubCategorySpec],
}

impl CategorySpec {
    /// Parsed tax line, if the code is known.
    pub fn schedule_c(&self) -> Option<ScheduleCLine> {
        self.schedule_c_line.and_then(ScheduleCLine::from_code)
    }
}

const fn sub(name: &'static str) -> SubCategorySpec {
    SubCategorySpec {
        name,
        schedule_c_line: None,
        since: 1,
    }
}

const fn sub_since(name: &'static str, since: u32) -> SubCategorySpec {
    SubCategorySpec {
        name,
        schedule_c_line: None,
        since,
    }
}

macro_rules! income {
    ($name:expr, $line:expr, book_reports: $book:expr, [$($sub:expr),* $(,)?] $(,)?) => {
        CategorySpec {
            name: $name,
            schedule_c_line: Some($line),
            category_type: CategoryType::Income,
            book_reports: $book,
            tax_reports: true,
            report_group: "Part I",
            since: 1,
            subcategories: &[$($sub),*],
        }
    };
}

macro_rules! expense {
    ($name:expr, $line:expr, $group:expr, [$($sub:expr),* $(,)?] $(,)?) => {
        CategorySpec {
            name: $name,
            schedule_c_line: Some($line),
            category_type: CategoryType::Expense,
            book_reports: true,
            tax_reports: true,
            report_group: $group,
            since: 1,
            subcategories: &[$($sub),*],
        }
    };
}

/// Schedule C default chart of accounts.
pub static SCHEDULE_C_CATEGORIES: &[CategorySpec] = &[
    // Part I - Income
    income!(
        "Gross Receipts",
        "1",
        book_reports: true,
        [
            sub("Sales"),
            sub("Sales Tax Collected"),
            sub("Drone Services"),
            sub("Photography Services"),
        ],
    ),
    // Tax reports only
    income!("Returns & Allowances", "2", book_reports: false, [sub("Returns & Allowances")]),
    // Part II - Expenses
    expense!("Advertising", "8", "Part II", [sub("Advertising")]),
    expense!(
        "Car & Truck Expenses",
        "9",
        "Part II",
        [
            sub("Gas"),
            sub("Vehicle Loan Interest"),
            sub("Vehicle Maintenance"),
            sub("Vehicle Loan Payments"),
            sub("Vehicle Equipment Purchases"),
            sub("Vehicle Repairs"),
            sub("Vehicle Other Expenses"),
        ],
    ),
    expense!("Commissions & Fees", "10", "Part II", [sub("Commissions & Fees")]),
    expense!("Contract Labor", "11", "Part II", [sub("Contractors")]),
    expense!("Depletion", "12", "Part II", [sub("Depletion")]),
    expense!(
        "Depreciation & Section 179",
        "13",
        "Part II",
        [sub("Depreciation"), sub("Section 179")],
    ),
    expense!("Employee Benefits", "14", "Part II", [sub("Accident Insurance")]),
    expense!(
        "Insurance",
        "15",
        "Part II",
        [sub("Aviation Insurance"), sub("Liability Insurance")],
    ),
    expense!("Interest: Mortgage", "16a", "Part II", [sub("Mortgage Interest")]),
    expense!("Interest: Other", "16b", "Part II", [sub("Other Interest")]),
    expense!(
        "Legal & Professional",
        "17",
        "Part II",
        [sub("Accounting Services"), sub("Legal Services")],
    ),
    expense!(
        "Office Expenses",
        "18",
        "Part II",
        [sub("Office Supplies"), sub("Postage & Shipping")],
    ),
    expense!(
        "Pension & Profit Sharing",
        "19",
        "Part II",
        [sub("Employee Retirement Contributions")],
    ),
    expense!(
        "Rent or Lease: Vehicles & Machinery",
        "20a",
        "Part II",
        [sub("Machinery Rental")],
    ),
    expense!(
        "Rent or Lease: Other Business Property",
        "20b",
        "Part II",
        [sub("Drone Equipment Rental"), sub("Photography Equipment Rental")],
    ),
    expense!("Repairs & Maintenance", "21", "Part II", [sub("Drone Equipment Repairs")]),
    expense!("Supplies", "22", "Part II", [sub("Materials & Supplies")]),
    expense!("Taxes & Licenses", "23", "Part II", [sub("Sales Tax Paid")]),
    expense!(
        "Travel & Meals: Travel",
        "24a",
        "Part II",
        [
            sub("Hotels"),
            sub("Car Rental"),
            sub("Airfare"),
            sub("Parking & Tolls"),
        ],
    ),
    expense!("Travel & Meals: Meals", "24b", "Part II", [sub("Travel Meals")]),
    expense!(
        "Utilities",
        "25",
        "Part II",
        [sub("Cell Phone"), sub("Internet")],
    ),
    expense!("Wages", "26", "Part II", [sub("Wages")]),
    expense!(
        "Energy Efficient Buildings",
        "27a",
        "Part II",
        [sub("Energy Efficient Buildings")],
    ),
    // Part V - Other expenses
    expense!(
        "Other Expenses",
        "27b",
        "Part V",
        [
            sub("Bank Fees"),
            sub("Computer Equipment"),
            sub("Drone Equipment"),
            sub("Education"),
            sub("Office Equipment"),
            sub("Photography Equipment"),
            sub("Software"),
            sub("Web Hosting"),
            sub_since("Cloud Services", 2),
            sub_since("Business Meals", 2),
        ],
    ),
];

static DEFAULT_CATALOG: Catalog = Catalog {
    version: CATALOG_VERSION,
    categories: SCHEDULE_C_CATEGORIES,
};

/// The catalog new seeds and rebuilds apply.
pub fn default_catalog() -> &'static Catalog {
    &DEFAULT_CATALOG
}

// ============================================================================
// CATALOG
// ============================================================================

/// A versioned, ordered, read-only set of default categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Catalog {
    pub version: u32,
    pub categories: &'static [CategorySpec],
}

/// One entry a re-seed would add to a business seeded from an older version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogAddition {
    pub category: &'static str,
    pub subcategory: Option<&'static str>,
    pub since: u32,
}

impl Catalog {
    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    pub fn subcategory_count(&self) -> usize {
        self.categories.iter().map(|c| c.subcategories.len()).sum()
    }

    /// Sanity checks run before any row is written.
    ///
    /// Category names must be unique, sub-category names unique within their
    /// parent, tax line codes known, and no entry newer than the catalog.
    pub fn validate(&self) -> Result<()> {
        let mut category_names = HashSet::new();

        for spec in self.categories {
            if spec.name.trim().is_empty() {
                return Err(DefaultsError::Catalog("blank category name".into()));
            }
            if !category_names.insert(spec.name) {
                return Err(DefaultsError::Catalog(format!(
                    "duplicate category '{}'",
                    spec.name
                )));
            }
            if let (Some(code), None) = (spec.schedule_c_line, spec.schedule_c()) {
                return Err(DefaultsError::Catalog(format!(
                    "unknown Schedule C line '{}' on '{}'",
                    code, spec.name
                )));
            }
            if spec.since > self.version {
                return Err(DefaultsError::Catalog(format!(
                    "'{}' introduced in v{} but catalog is v{}",
                    spec.name, spec.since, self.version
                )));
            }

            let mut sub_names = HashSet::new();
            for sub in spec.subcategories {
                if sub.name.trim().is_empty() {
                    return Err(DefaultsError::Catalog(format!(
                        "blank sub-category name under '{}'",
                        spec.name
                    )));
                }
                if !sub_names.insert(sub.name) {
                    return Err(DefaultsError::Catalog(format!(
                        "duplicate sub-category '{}' under '{}'",
                        sub.name, spec.name
                    )));
                }
                if let Some(code) = sub.schedule_c_line {
                    if ScheduleCLine::from_code(code).is_none() {
                        return Err(DefaultsError::Catalog(format!(
                            "unknown Schedule C line '{}' on '{}'",
                            code, sub.name
                        )));
                    }
                }
                if sub.since < spec.since || sub.since > self.version {
                    return Err(DefaultsError::Catalog(format!(
                        "sub-category '{}' has invalid version {}",
                        sub.name, sub.since
                    )));
                }
            }
        }

        Ok(())
    }

    /// Stable SHA-256 over the ordered entries (hex).
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("v{}\n", self.version));

        for spec in self.categories {
            hasher.update(format!(
                "C|{}|{}|{}|{}|{}|{}\n",
                spec.name,
                spec.schedule_c_line.unwrap_or(""),
                spec.category_type.as_str(),
                spec.book_reports,
                spec.tax_reports,
                spec.report_group,
            ));
            for sub in spec.subcategories {
                hasher.update(format!(
                    "S|{}|{}\n",
                    sub.name,
                    sub.schedule_c_line.unwrap_or("")
                ));
            }
        }

        format!("{:x}", hasher.finalize())
    }

    /// Entries introduced after `applied_version`.
    ///
    /// A new category is listed once; its sub-categories are implied.
    pub fn additions_since(&self, applied_version: u32) -> Vec<CatalogAddition> {
        let mut additions = Vec::new();

        for spec in self.categories {
            if spec.since > applied_version {
                additions.push(CatalogAddition {
                    category: spec.name,
                    subcategory: None,
                    since: spec.since,
                });
                continue;
            }
            for sub in spec.subcategories.iter().filter(|s| s.since > applied_version) {
                additions.push(CatalogAddition {
                    category: spec.name,
                    subcategory: Some(sub.name),
                    since: sub.since,
                });
            }
        }

        additions
    }
}

/// Small catalogs shared by the unit tests of other modules.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    static TRAVEL_V1: &[CategorySpec] = &[expense!(
        "Travel",
        "24a",
        "Part II",
        [sub("Airfare"), sub("Lodging")],
    )];

    static TRAVEL_V2: &[CategorySpec] = &[
        expense!(
            "Travel",
            "24a",
            "Part II",
            [sub("Airfare"), sub("Lodging"), sub_since("Parking", 2)],
        ),
        CategorySpec {
            name: "Meals",
            schedule_c_line: Some("24b"),
            category_type: CategoryType::Expense,
            book_reports: true,
            tax_reports: true,
            report_group: "Part II",
            since: 2,
            subcategories: &[sub_since("Client Meals", 2)],
        },
    ];

    /// One category, two sub-categories.
    pub static TRAVEL: Catalog = Catalog {
        version: 1,
        categories: TRAVEL_V1,
    };

    /// TRAVEL plus a sub-category and a category introduced in v2.
    pub static TRAVEL_NEXT: Catalog = Catalog {
        version: 2,
        categories: TRAVEL_V2,
    };
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_is_valid() {
        let catalog = default_catalog();

        catalog.validate().unwrap();
        assert_eq!(catalog.version, CATALOG_VERSION);
        assert_eq!(catalog.category_count(), 26);
        assert_eq!(catalog.subcategory_count(), 53);
    }

    #[test]
    fn test_every_schedule_c_line_used_once() {
        let catalog = default_catalog();

        for line in ScheduleCLine::ALL {
            let uses = catalog
                .categories
                .iter()
                .filter(|c| c.schedule_c() == Some(line))
                .count();
            assert_eq!(uses, 1, "line {} should map to one category", line.code());
        }
    }

    #[test]
    fn test_line_code_parsing() {
        assert_eq!(ScheduleCLine::from_code("16A"), Some(ScheduleCLine::InterestMortgage));
        assert_eq!(ScheduleCLine::from_code(" 27b "), Some(ScheduleCLine::OtherExpensesPartV));
        assert_eq!(ScheduleCLine::from_code("99"), None);
        assert_eq!(ScheduleCLine::OtherExpensesPartV.part(), "Part V");
        assert_eq!(ScheduleCLine::Travel.part(), "Part II");
    }

    #[test]
    fn test_duplicate_subcategory_rejected() {
        static BROKEN: &[CategorySpec] = &[expense!(
            "Travel",
            "24a",
            "Part II",
            [sub("Airfare"), sub("Airfare")],
        )];
        let catalog = Catalog {
            version: 1,
            categories: BROKEN,
        };

        let err = catalog.validate().unwrap_err();
        assert!(matches!(err, DefaultsError::Catalog(ref m) if m.contains("Airfare")));
    }

    #[test]
    fn test_duplicate_category_rejected() {
        static BROKEN: &[CategorySpec] = &[
            expense!("Travel", "24a", "Part II", []),
            expense!("Travel", "24b", "Part II", []),
        ];
        let catalog = Catalog {
            version: 1,
            categories: BROKEN,
        };

        assert!(catalog.validate().is_err());
    }

    #[test]
    fn test_unknown_line_rejected() {
        static BROKEN: &[CategorySpec] = &[expense!("Travel", "99z", "Part II", [])];
        let catalog = Catalog {
            version: 1,
            categories: BROKEN,
        };

        assert!(catalog.validate().is_err());
    }

    #[test]
    fn test_additions_since_previous_version() {
        let catalog = default_catalog();

        let additions = catalog.additions_since(1);
        let names: Vec<_> = additions.iter().filter_map(|a| a.subcategory).collect();
        assert_eq!(names, vec!["Cloud Services", "Business Meals"]);
        assert!(additions.iter().all(|a| a.category == "Other Expenses"));

        assert!(catalog.additions_since(CATALOG_VERSION).is_empty());
        assert_eq!(catalog.additions_since(0).len(), catalog.category_count());
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        static SMALL: &[CategorySpec] = &[expense!("Travel", "24a", "Part II", [sub("Airfare")])];
        static BIGGER: &[CategorySpec] = &[expense!(
            "Travel",
            "24a",
            "Part II",
            [sub("Airfare"), sub("Lodging")],
        )];

        let a = Catalog { version: 1, categories: SMALL };
        let b = Catalog { version: 1, categories: BIGGER };

        assert_eq!(a.fingerprint(), a.fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }
}
