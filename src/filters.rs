use serde::Serialize;

use crate::validator::{permitted, Validator};

/// Pagination and sort parameters shared by list endpoints. The sort value
/// must come from the endpoint's safelist; a leading `-` flips the order.
#[derive(Debug, Clone)]
pub struct Filters {
    pub page: i64,
    pub page_size: i64,
    pub sort: String,
    pub sort_safelist: &'static [&'static str],
}

impl Filters {
    pub fn validate(&self, v: &mut Validator) {
        v.check(self.page > 0, "page", "must be greater than zero");
        v.check(self.page <= 1000, "page", "must be a maximum of 1000");
        v.check(self.page_size > 0, "page_size", "must be greater than zero");
        v.check(self.page_size <= 100, "page_size", "must be a maximum of 100");
        v.check(
            permitted(&self.sort, self.sort_safelist),
            "sort",
            "invalid sort value",
        );
    }

    /// Only callable after `validate` has passed; the safelist keeps user
    /// input out of the SQL text.
    pub fn sort_column(&self) -> &str {
        for safe in self.sort_safelist {
            if self.sort == *safe {
                return self.sort.trim_start_matches('-');
            }
        }
        unreachable!("unsafe sort parameter: {}", self.sort);
    }

    pub fn sort_order(&self) -> &'static str {
        if self.sort.starts_with('-') {
            "DESC"
        } else {
            "ASC"
        }
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

/// Pagination metadata returned alongside list results.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "is_zero")]
    pub current_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub page_size: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub first_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub last_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub total_records: i64,
}

fn is_zero(n: &i64) -> bool {
    *n == 0
}

impl Metadata {
    pub fn calculate(total_records: i64, page: i64, page_size: i64) -> Self {
        if total_records == 0 {
            return Metadata::default();
        }
        Metadata {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: (total_records + page_size - 1) / page_size,
            total_records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAFELIST: &[&str] = &["id", "steps", "-id", "-steps"];

    fn filters(page: i64, page_size: i64, sort: &str) -> Filters {
        Filters {
            page,
            page_size,
            sort: sort.to_string(),
            sort_safelist: SAFELIST,
        }
    }

    #[test]
    fn sort_column_strips_direction_prefix() {
        assert_eq!(filters(1, 20, "-steps").sort_column(), "steps");
        assert_eq!(filters(1, 20, "steps").sort_column(), "steps");
    }

    #[test]
    fn sort_order_follows_prefix() {
        assert_eq!(filters(1, 20, "-id").sort_order(), "DESC");
        assert_eq!(filters(1, 20, "id").sort_order(), "ASC");
    }

    #[test]
    fn offset_is_page_based() {
        let f = filters(3, 20, "id");
        assert_eq!(f.limit(), 20);
        assert_eq!(f.offset(), 40);
    }

    #[test]
    fn validate_rejects_out_of_range_and_unknown_sort() {
        let mut v = Validator::new();
        filters(0, 200, "name").validate(&mut v);
        assert!(v.errors.contains_key("page"));
        assert!(v.errors.contains_key("page_size"));
        assert!(v.errors.contains_key("sort"));
    }

    #[test]
    fn metadata_math() {
        let m = Metadata::calculate(101, 2, 20);
        assert_eq!(m.last_page, 6);
        assert_eq!(m.current_page, 2);
        assert_eq!(m.total_records, 101);
    }

    #[test]
    fn metadata_empty_result_set() {
        assert_eq!(Metadata::calculate(0, 1, 20), Metadata::default());
    }
}
