use std::sync::Arc;

use sqlx::AnyPool;

use crate::config::Config;
use crate::db::repository::{
    InventoryRepository, ProjectRepository, ShiftRepository, TechnicianRepository,
    TemplateRepository, UserRepository,
};
use crate::error::AppResult;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub projects: ProjectRepository,
    pub shifts: ShiftRepository,
    pub inventory: InventoryRepository,
    pub templates: TemplateRepository,
    pub users: UserRepository,
    pub technicians: TechnicianRepository,
}

impl AppState {
    pub fn new(config: Config, db: AnyPool) -> Self {
        Self {
            config: Arc::new(config),
            projects: ProjectRepository::new(db.clone()),
            shifts: ShiftRepository::new(db.clone()),
            inventory: InventoryRepository::new(db.clone()),
            templates: TemplateRepository::new(db.clone()),
            users: UserRepository::new(db.clone()),
            technicians: TechnicianRepository::new(db),
        }
    }

    /// Seeds every empty collection up front so the first request does not pay for it.
    pub async fn seed(&self) -> AppResult<()> {
        self.projects.seed_if_empty().await?;
        self.shifts.seed_if_empty().await?;
        self.inventory.seed_if_empty().await?;
        self.templates.seed_if_empty().await?;
        self.users.seed_if_empty().await?;
        self.technicians.seed_if_empty().await?;
        Ok(())
    }
}
