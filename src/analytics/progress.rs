use crate::models::{Category, Project};

/// Completion ratio of a single category in `[0, 1]`; an empty category counts as 0.
pub fn category_ratio(category: &Category) -> f64 {
    if category.sub_tasks.is_empty() {
        return 0.0;
    }

    category.completed_count() as f64 / category.sub_tasks.len() as f64
}

pub fn category_progress(category: &Category) -> f64 {
    category_ratio(category) * 100.0
}

/// Weighted completion percentage of a project.
///
/// Each category contributes its completion ratio scaled by its weight, and the
/// sum is normalised by the project's total weight. Returns 0 when there are no
/// categories or the weights sum to 0. Weights are not validated.
pub fn overall_progress(project: &Project) -> f64 {
    if project.categories.is_empty() {
        return 0.0;
    }

    let weighted: f64 = project
        .categories
        .iter()
        .map(|category| category_ratio(category) * category.weight)
        .sum();
    let total_weight: f64 = project
        .categories
        .iter()
        .map(|category| category.weight)
        .sum();

    if total_weight == 0.0 {
        return 0.0;
    }

    weighted / total_weight * 100.0
}
