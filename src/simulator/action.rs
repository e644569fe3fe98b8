/// Simulated user actions and their weighted selection.
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Something a simulated user does between think times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Login,
    ListPrintShops,
    NearestPrintShops,
    BudgetRound,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::Login,
        Action::ListPrintShops,
        Action::NearestPrintShops,
        Action::BudgetRound,
    ];

    /// Label used in reports, matching the endpoint the action hits.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Login => "/login",
            Action::ListPrintShops => "/printshops",
            Action::NearestPrintShops => "/printshops/nearest",
            Action::BudgetRound => "/consumer/budget round",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relative frequency of each action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionWeights {
    pub login: u32,
    pub list_printshops: u32,
    pub nearest_printshops: u32,
    pub budget_round: u32,
}

impl Default for ActionWeights {
    fn default() -> Self {
        Self {
            login: 2,
            list_printshops: 1,
            nearest_printshops: 4,
            budget_round: 3,
        }
    }
}

impl ActionWeights {
    /// Parse `"login,list,nearest,budget"`, e.g. `"2,1,4,3"`.
    pub fn parse(s: &str) -> Result<Self, String> {
        let values = s
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<u32>()
                    .map_err(|_| format!("Invalid weight '{}' in '{}'", part.trim(), s))
            })
            .collect::<Result<Vec<_>, _>>()?;

        match values.as_slice() {
            &[login, list_printshops, nearest_printshops, budget_round] => Ok(Self {
                login,
                list_printshops,
                nearest_printshops,
                budget_round,
            }),
            _ => Err(format!(
                "Expected 4 comma-separated weights (login,list,nearest,budget), got '{}'",
                s
            )),
        }
    }

    pub fn weight(&self, action: Action) -> u32 {
        match action {
            Action::Login => self.login,
            Action::ListPrintShops => self.list_printshops,
            Action::NearestPrintShops => self.nearest_printshops,
            Action::BudgetRound => self.budget_round,
        }
    }

    pub fn total(&self) -> u64 {
        Action::ALL.iter().map(|&a| u64::from(self.weight(a))).sum()
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.total() == 0 {
            return Err(AppError::Config(
                "At least one action weight must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Draw an action with probability proportional to its weight.
    pub fn choose(&self, rng: &mut fastrand::Rng) -> Action {
        let total = self.total();
        if total == 0 {
            return Action::BudgetRound;
        }
        let mut roll = rng.u64(0..total);
        for action in Action::ALL {
            let weight = u64::from(self.weight(action));
            if roll < weight {
                return action;
            }
            roll -= weight;
        }
        Action::BudgetRound
    }
}
