//! Observation plans
//!
//! A plan is a list of targets stored one row each in `tbl_targets`. The row's
//! `targettype_id` decides which of the optional columns carry the target.

use serde::{Deserialize, Serialize};

use crate::catalog::{StellarCatalog, StellarObject};
use crate::db::models::{NewPlan, NewTargetRow, Plan, TargetRow};
use crate::db::repository;
use crate::error::{ArchiveError, QueryResultExt, Result};
use crate::state::ArchiveDb;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetType {
    MajorPlanet = 1,
    MinorPlanet = 2,
    Comet = 3,
    Stellar = 4,
}

impl TryFrom<i32> for TargetType {
    type Error = ArchiveError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            1 => Ok(TargetType::MajorPlanet),
            2 => Ok(TargetType::MinorPlanet),
            3 => Ok(TargetType::Comet),
            4 => Ok(TargetType::Stellar),
            other => Err(ArchiveError::internal(format!("unknown target type {}", other))),
        }
    }
}

/// Major planets, numbered outward from the sun.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Planet {
    Mercury = 1,
    Venus = 2,
    Earth = 3,
    Mars = 4,
    Jupiter = 5,
    Saturn = 6,
    Uranus = 7,
    Neptune = 8,
    Pluto = 9,
}

impl Planet {
    pub fn name(&self) -> &'static str {
        match self {
            Planet::Mercury => "Mercury",
            Planet::Venus => "Venus",
            Planet::Earth => "Earth",
            Planet::Mars => "Mars",
            Planet::Jupiter => "Jupiter",
            Planet::Saturn => "Saturn",
            Planet::Uranus => "Uranus",
            Planet::Neptune => "Neptune",
            Planet::Pluto => "Pluto",
        }
    }
}

impl TryFrom<i32> for Planet {
    type Error = ArchiveError;

    fn try_from(value: i32) -> Result<Self> {
        Ok(match value {
            1 => Planet::Mercury,
            2 => Planet::Venus,
            3 => Planet::Earth,
            4 => Planet::Mars,
            5 => Planet::Jupiter,
            6 => Planet::Saturn,
            7 => Planet::Uranus,
            8 => Planet::Neptune,
            9 => Planet::Pluto,
            other => return Err(ArchiveError::internal(format!("unknown planet {}", other))),
        })
    }
}

/// A plan target as loaded, ready for ephemeris work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ObservationTarget {
    MajorPlanet {
        rank: i32,
        planet: Planet,
    },
    MinorPlanet {
        rank: i32,
        /// Key into the orbital elements catalog
        elements_id: i32,
        name: String,
    },
    Comet {
        rank: i32,
        elements_id: i32,
        name: String,
    },
    Stellar {
        rank: i32,
        name_id: i64,
        object: StellarObject,
    },
}

impl ObservationTarget {
    pub fn rank(&self) -> i32 {
        match self {
            ObservationTarget::MajorPlanet { rank, .. }
            | ObservationTarget::MinorPlanet { rank, .. }
            | ObservationTarget::Comet { rank, .. }
            | ObservationTarget::Stellar { rank, .. } => *rank,
        }
    }

    pub fn target_type(&self) -> TargetType {
        match self {
            ObservationTarget::MajorPlanet { .. } => TargetType::MajorPlanet,
            ObservationTarget::MinorPlanet { .. } => TargetType::MinorPlanet,
            ObservationTarget::Comet { .. } => TargetType::Comet,
            ObservationTarget::Stellar { .. } => TargetType::Stellar,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ObservationTarget::MajorPlanet { planet, .. } => planet.name(),
            ObservationTarget::MinorPlanet { name, .. } | ObservationTarget::Comet { name, .. } => {
                name
            }
            ObservationTarget::Stellar { object, .. } => &object.name,
        }
    }
}

/// What to store when adding a target to a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TargetSpec {
    MajorPlanet(Planet),
    MinorPlanet { elements_id: i32, name: String },
    Comet { elements_id: i32, name: String },
    Stellar { name_id: i64, name: Option<String> },
}

impl TargetSpec {
    fn to_row(&self, plan_id: i32, rank: i32) -> NewTargetRow {
        let row = NewTargetRow {
            plan_id,
            rank,
            ..NewTargetRow::default()
        };
        match self {
            TargetSpec::MajorPlanet(planet) => NewTargetRow {
                target_type: TargetType::MajorPlanet as i32,
                target_id: Some(*planet as i32),
                target_name: Some(planet.name().to_string()),
                ..row
            },
            TargetSpec::MinorPlanet { elements_id, name } => NewTargetRow {
                target_type: TargetType::MinorPlanet as i32,
                target_id: Some(*elements_id),
                target_name: Some(name.clone()),
                ..row
            },
            TargetSpec::Comet { elements_id, name } => NewTargetRow {
                target_type: TargetType::Comet as i32,
                target_id: Some(*elements_id),
                target_name: Some(name.clone()),
                ..row
            },
            TargetSpec::Stellar { name_id, name } => NewTargetRow {
                target_type: TargetType::Stellar as i32,
                name_id: Some(*name_id),
                target_name: name.clone(),
                ..row
            },
        }
    }
}

pub struct PlanReader<'a> {
    db: &'a ArchiveDb,
    catalog: &'a dyn StellarCatalog,
}

impl<'a> PlanReader<'a> {
    /// Creates a new instance of [`PlanReader`]
    pub fn new(db: &'a ArchiveDb, catalog: &'a dyn StellarCatalog) -> Self {
        Self { db, catalog }
    }

    pub fn plan(&self, plan_id: i32) -> Result<Option<Plan>> {
        let mut conn = self.db.conn()?;
        repository::get_plan_by_id(&mut conn, plan_id).during("load plan")
    }

    pub fn create_plan(&self, new_plan: &NewPlan) -> Result<i32> {
        if new_plan.name.trim().is_empty() {
            return Err(ArchiveError::InvalidInput("plan name is empty".into()));
        }
        let mut conn = self.db.conn()?;
        let plan_id = repository::create_plan(&mut conn, new_plan).during("create plan")?;
        log::info!("Created plan {} '{}'", plan_id, new_plan.name);
        Ok(plan_id)
    }

    /// Targets of a plan in storage order. `rank` is carried on each target
    /// and left to the caller to sort by.
    pub fn load_targets(&self, plan_id: i32) -> Result<Vec<ObservationTarget>> {
        let rows = {
            let mut conn = self.db.conn()?;
            repository::get_plan_targets(&mut conn, plan_id).during("load plan targets")?
        };
        log::debug!("Plan {} has {} target row(s)", plan_id, rows.len());

        rows.iter().map(|row| self.build_target(row)).collect()
    }

    pub fn add_target(&self, plan_id: i32, rank: i32, target: &TargetSpec) -> Result<i32> {
        if self.plan(plan_id)?.is_none() {
            return Err(ArchiveError::not_found("plan", plan_id));
        }
        let mut conn = self.db.conn()?;
        repository::create_target(&mut conn, &target.to_row(plan_id, rank)).during("add plan target")
    }

    /// Returns false when there was no such row.
    pub fn remove_target(&self, target_row_id: i32) -> Result<bool> {
        let mut conn = self.db.conn()?;
        let deleted =
            repository::delete_target(&mut conn, target_row_id).during("remove plan target")?;
        Ok(deleted > 0)
    }

    fn build_target(&self, row: &TargetRow) -> Result<ObservationTarget> {
        let rank = row.rank;
        let target = match TargetType::try_from(row.target_type)? {
            TargetType::MajorPlanet => ObservationTarget::MajorPlanet {
                rank,
                planet: Planet::try_from(required(row, row.target_id, "target_id")?)?,
            },
            TargetType::MinorPlanet => ObservationTarget::MinorPlanet {
                rank,
                elements_id: required(row, row.target_id, "target_id")?,
                name: required(row, row.target_name.clone(), "target_name")?,
            },
            TargetType::Comet => ObservationTarget::Comet {
                rank,
                elements_id: required(row, row.target_id, "target_id")?,
                name: required(row, row.target_name.clone(), "target_name")?,
            },
            TargetType::Stellar => {
                let name_id = required(row, row.name_id, "name_id")?;
                ObservationTarget::Stellar {
                    rank,
                    name_id,
                    object: self.catalog.query_stellar_by_name_id(name_id)?,
                }
            }
        };
        Ok(target)
    }
}

fn required<T>(row: &TargetRow, value: Option<T>, column: &str) -> Result<T> {
    value.ok_or_else(|| {
        ArchiveError::internal(format!(
            "target row {} of type {} has no {}",
            row.id, row.target_type, column
        ))
    })
}

#[cfg(test)]
mod tests {
    use crate::test_support::*;

    use super::*;

    const SIRIUS: i64 = 32_263;

    fn plan_with_targets(reader: &PlanReader) -> anyhow::Result<i32> {
        let plan_id = reader.create_plan(&NewPlan {
            name: "Winter".into(),
            description: None,
        })?;
        reader.add_target(plan_id, 2, &TargetSpec::MajorPlanet(Planet::Jupiter))?;
        reader.add_target(
            plan_id,
            1,
            &TargetSpec::Stellar {
                name_id: SIRIUS,
                name: Some("Sirius".into()),
            },
        )?;
        reader.add_target(
            plan_id,
            3,
            &TargetSpec::Comet {
                elements_id: 12,
                name: "12P/Pons-Brooks".into(),
            },
        )?;
        Ok(plan_id)
    }

    mod load_targets {
        use super::*;

        /// Expect one catalog lookup for the single stellar row and storage order kept
        #[test]
        fn mixed_targets() -> anyhow::Result<()> {
            let test = TestArchive::new()?;
            let catalog = CountingCatalog::with_object(SIRIUS, "Sirius");
            let reader = PlanReader::new(&test.db, &catalog);
            let plan_id = plan_with_targets(&reader)?;

            let targets = reader.load_targets(plan_id)?;

            assert_eq!(catalog.lookups.get(), 1);
            assert_eq!(
                targets.iter().map(ObservationTarget::target_type).collect::<Vec<_>>(),
                vec![TargetType::MajorPlanet, TargetType::Stellar, TargetType::Comet]
            );
            assert_eq!(targets.iter().map(ObservationTarget::rank).collect::<Vec<_>>(), vec![2, 1, 3]);
            assert_eq!(targets[0].name(), "Jupiter");
            assert_eq!(targets[1].name(), "Sirius");
            assert_eq!(targets[2].name(), "12P/Pons-Brooks");
            Ok(())
        }

        /// Expect an unknown target type to fail the whole load
        #[test]
        fn unknown_type_is_internal_inconsistency() -> anyhow::Result<()> {
            let test = TestArchive::new()?;
            let catalog = CountingCatalog::with_object(SIRIUS, "Sirius");
            let reader = PlanReader::new(&test.db, &catalog);
            let plan_id = plan_with_targets(&reader)?;
            {
                let mut conn = test.db.conn()?;
                repository::create_target(
                    &mut conn,
                    &NewTargetRow {
                        plan_id,
                        rank: 4,
                        target_type: 99,
                        ..NewTargetRow::default()
                    },
                )?;
            }

            let result = reader.load_targets(plan_id);

            assert!(matches!(result, Err(ArchiveError::InternalInconsistency(_))));
            Ok(())
        }

        /// Expect a row without its type-specific column to be reported, not skipped
        #[test]
        fn missing_column() -> anyhow::Result<()> {
            let test = TestArchive::new()?;
            let catalog = CountingCatalog::default();
            let reader = PlanReader::new(&test.db, &catalog);
            let plan_id = reader.create_plan(&NewPlan {
                name: "Broken".into(),
                description: None,
            })?;
            {
                let mut conn = test.db.conn()?;
                repository::create_target(
                    &mut conn,
                    &NewTargetRow {
                        plan_id,
                        target_type: TargetType::Stellar as i32,
                        ..NewTargetRow::default()
                    },
                )?;
            }

            let result = reader.load_targets(plan_id);

            assert!(matches!(result, Err(ArchiveError::InternalInconsistency(_))));
            assert_eq!(catalog.lookups.get(), 0);
            Ok(())
        }

        /// Expect an empty list for a plan without targets
        #[test]
        fn empty_plan() -> anyhow::Result<()> {
            let test = TestArchive::new()?;
            let catalog = CountingCatalog::default();
            let reader = PlanReader::new(&test.db, &catalog);

            assert!(reader.load_targets(7)?.is_empty());
            Ok(())
        }
    }

    mod editing {
        use super::*;

        /// Expect removed targets to disappear from the next load
        #[test]
        fn remove_target() -> anyhow::Result<()> {
            let test = TestArchive::new()?;
            let catalog = CountingCatalog::default();
            let reader = PlanReader::new(&test.db, &catalog);
            let plan_id = reader.create_plan(&NewPlan {
                name: "Planets".into(),
                description: Some("opposition season".into()),
            })?;
            let mars = reader.add_target(plan_id, 1, &TargetSpec::MajorPlanet(Planet::Mars))?;
            reader.add_target(plan_id, 2, &TargetSpec::MajorPlanet(Planet::Saturn))?;

            assert!(reader.remove_target(mars)?);
            assert!(!reader.remove_target(mars)?);

            let targets = reader.load_targets(plan_id)?;
            assert_eq!(
                targets,
                vec![ObservationTarget::MajorPlanet {
                    rank: 2,
                    planet: Planet::Saturn
                }]
            );
            Ok(())
        }

        /// Expect adding to a missing plan to report NotFound
        #[test]
        fn add_to_missing_plan() -> anyhow::Result<()> {
            let test = TestArchive::new()?;
            let catalog = CountingCatalog::default();
            let reader = PlanReader::new(&test.db, &catalog);

            let result = reader.add_target(
                3,
                1,
                &TargetSpec::MinorPlanet {
                    elements_id: 4,
                    name: "Vesta".into(),
                },
            );

            assert!(matches!(result, Err(ArchiveError::NotFound { .. })));
            Ok(())
        }
    }

    #[test]
    fn target_type_ids() {
        assert_eq!(TargetType::try_from(4).ok(), Some(TargetType::Stellar));
        assert!(TargetType::try_from(0).is_err());
        assert_eq!(Planet::try_from(5).ok(), Some(Planet::Jupiter));
        assert!(Planet::try_from(10).is_err());
    }
}
