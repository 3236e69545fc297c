//! Embedded user and train tables

use crate::clock::AppTime;
use crate::errors::DataError;
use crate::phases::PhaseFamily;
use rand::Rng;
use serde::Deserialize;

const USERS_CSV: &str = include_str!("../data/users.csv");
const TICKET_SOLD_TRAINS_CSV: &str = include_str!("../data/train_configs_ticket_sold.csv");
const SALES_TRAINS_CSV: &str = include_str!("../data/train_configs_sales.csv");

/// Hours between consecutive departures of a newly registered train
const DEPARTURE_INTERVAL_HOURS: u32 = 3;

fn read_table<T: for<'de> Deserialize<'de>>(
    table: &'static str,
    source: &str,
) -> Result<Vec<T>, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(source.as_bytes());

    let rows = reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(|source| DataError::Csv { table, source })?;
    if rows.is_empty() {
        return Err(DataError::Empty { table });
    }
    Ok(rows)
}

/// A buyer account known to the target
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub name: String,
    pub password: String,
    pub global_payment_token: String,
    pub credit_amount: i64,
}

#[derive(Debug, Clone)]
pub struct UserTable {
    users: Vec<User>,
}

impl UserTable {
    pub fn embedded() -> Result<Self, DataError> {
        Self::from_csv("users.csv", USERS_CSV)
    }

    pub fn from_csv(table: &'static str, source: &str) -> Result<Self, DataError> {
        Ok(Self {
            users: read_table(table, source)?,
        })
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&User> {
        self.users.get(index)
    }

    /// Uniform pick over every row
    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> &User {
        &self.users[rng.random_range(0..self.users.len())]
    }
}

/// One row of a train registration table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrainConfig {
    pub model_name: String,
    pub name_prefix: String,
    pub first_departure_time: String,
}

impl TrainConfig {
    /// `Business-4` with prefix `16` becomes `B416` plus one random digit
    pub fn train_name<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let initials: String = self
            .model_name
            .split('-')
            .filter_map(|part| part.chars().next())
            .collect();
        format!("{}{}{}", initials, self.name_prefix, rng.random_range(0..10))
    }

    pub fn departure_times(&self) -> Result<Vec<String>, DataError> {
        generate_departure_times(&self.first_departure_time)
    }
}

/// Every [`DEPARTURE_INTERVAL_HOURS`] from `first` while before `24:00`
pub fn generate_departure_times(first: &str) -> Result<Vec<String>, DataError> {
    let start = AppTime::parse(first)
        .filter(|time| !time.is_end_of_day())
        .ok_or_else(|| DataError::InvalidTime {
            value: first.to_string(),
        })?;

    let mut times = Vec::new();
    let mut current = start;
    while !current.is_end_of_day() {
        times.push(current.to_string());
        current = current.plus_hours(DEPARTURE_INTERVAL_HOURS);
    }
    Ok(times)
}

#[derive(Debug, Clone)]
pub struct TrainConfigTable {
    name: &'static str,
    configs: Vec<TrainConfig>,
}

impl TrainConfigTable {
    pub fn from_csv(name: &'static str, source: &str) -> Result<Self, DataError> {
        Ok(Self {
            name,
            configs: read_table(name, source)?,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// `count` rows starting at `start`
    pub fn slice(&self, start: usize, count: usize) -> Result<&[TrainConfig], DataError> {
        let end = start + count;
        self.configs
            .get(start..end)
            .ok_or(DataError::NotEnoughConfigs {
                table: self.name,
                start,
                end,
                available: self.configs.len(),
            })
    }
}

/// The two registration tables, one per phase family
#[derive(Debug, Clone)]
pub struct TrainCatalog {
    pub ticket_sold: TrainConfigTable,
    pub sales: TrainConfigTable,
}

impl TrainCatalog {
    pub fn embedded() -> Result<Self, DataError> {
        Ok(Self {
            ticket_sold: TrainConfigTable::from_csv(
                "train_configs_ticket_sold.csv",
                TICKET_SOLD_TRAINS_CSV,
            )?,
            sales: TrainConfigTable::from_csv("train_configs_sales.csv", SALES_TRAINS_CSV)?,
        })
    }

    pub fn table(&self, family: PhaseFamily) -> &TrainConfigTable {
        match family {
            PhaseFamily::Tickets => &self.ticket_sold,
            PhaseFamily::Sales => &self.sales,
        }
    }
}
