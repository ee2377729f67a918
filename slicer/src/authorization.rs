use crate::config::AuthorizationConfig;
use slicer_server::workspace::{Authorizer, Cube, NotAuthorized};
use std::collections::{HashMap, HashSet};

const ANY_CUBE: &str = "*";

/// Grants access from a static per-user cube list.
#[derive(Debug)]
pub struct RightsAuthorizer {
    guest: HashSet<String>,
    rights: HashMap<String, HashSet<String>>,
}

impl RightsAuthorizer {
    pub fn new(config: AuthorizationConfig) -> Self {
        RightsAuthorizer {
            guest: config.guest.into_iter().collect(),
            rights: config
                .rights
                .into_iter()
                .map(|(user, cubes)| (user, cubes.into_iter().collect()))
                .collect(),
        }
    }
}

fn allows(cubes: &HashSet<String>, cube: &str) -> bool {
    cubes.contains(ANY_CUBE) || cubes.contains(cube)
}

impl Authorizer for RightsAuthorizer {
    fn authorize(&self, token: Option<&str>, cube: &dyn Cube) -> Result<(), NotAuthorized> {
        let allowed = match token.and_then(|user| self.rights.get(user)) {
            Some(cubes) => allows(cubes, cube.name()),
            // Unknown users fall back to guest rights
            None => allows(&self.guest, cube.name()),
        };

        if allowed {
            Ok(())
        } else {
            Err(NotAuthorized::new(format!(
                "access to cube '{}' denied for {}",
                cube.name(),
                token.unwrap_or("anonymous caller")
            )))
        }
    }
}
