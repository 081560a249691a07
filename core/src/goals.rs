use serde::Serialize;

use crate::aggregate::DayTotals;
use crate::models::Goals;

/// Percent values above this are reported as this.
pub const PERCENT_CAP: i64 = 200;
pub const ON_TARGET_LOW: i64 = 90;
pub const ON_TARGET_HIGH: i64 = 110;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Under,
    OnTarget,
    Over,
}

impl GoalStatus {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Under => "under goal",
            Self::OnTarget => "on target",
            Self::Over => "over goal",
        }
    }

    fn classify(percent: i64) -> Self {
        if percent < ON_TARGET_LOW {
            Self::Under
        } else if percent <= ON_TARGET_HIGH {
            Self::OnTarget
        } else {
            Self::Over
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GoalEvaluation {
    pub goal: f64,
    pub percent: i64,
    /// Width of a progress bar, 0..=100.
    pub bar_percent: i64,
    pub status: GoalStatus,
    pub remaining: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub over_by: Option<f64>,
}

/// `NoGoal` is a signal, not an error: callers hide progress display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GoalProgress {
    NoGoal,
    Tracked(GoalEvaluation),
}

impl GoalProgress {
    #[must_use]
    pub fn evaluation(&self) -> Option<&GoalEvaluation> {
        match self {
            Self::NoGoal => None,
            Self::Tracked(eval) => Some(eval),
        }
    }
}

fn usable_goal(goal: Option<f64>) -> Option<f64> {
    goal.filter(|g| g.is_finite() && *g > 0.0)
}

/// Never negative; amounts over goal are reported through `over_by`.
#[must_use]
pub fn remaining_budget(total: f64, goal: f64) -> f64 {
    (goal - total).max(0.0)
}

#[must_use]
pub fn evaluate_goal(total: f64, goal: Option<f64>) -> GoalProgress {
    let Some(goal) = usable_goal(goal) else {
        return GoalProgress::NoGoal;
    };

    let percent = ((total / goal * 100.0).round() as i64).min(PERCENT_CAP);
    let over_by = (total > goal).then(|| total - goal);

    GoalProgress::Tracked(GoalEvaluation {
        goal,
        percent,
        bar_percent: percent.clamp(0, 100),
        status: GoalStatus::classify(percent),
        remaining: remaining_budget(total, goal),
        over_by,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DayGoalReport {
    /// Evaluated against net calories (eaten minus burned).
    pub calories: GoalProgress,
    pub protein: GoalProgress,
    pub carbs: GoalProgress,
    pub fat: GoalProgress,
}

#[must_use]
pub fn evaluate_day(totals: &DayTotals, goals: &Goals) -> DayGoalReport {
    DayGoalReport {
        calories: evaluate_goal(totals.net, goals.calories),
        protein: evaluate_goal(totals.protein, goals.protein),
        carbs: evaluate_goal(totals.carbs, goals.carbs),
        fat: evaluate_goal(totals.fat, goals.fat),
    }
}
