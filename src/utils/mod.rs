pub mod time;

/// Short random id for generated canvas nodes.
pub fn shortid() -> String {
    nanoid::nanoid!(10)
}

/// Id for a newly created step.
pub fn step_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
