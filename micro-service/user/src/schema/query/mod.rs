pub mod user;

use async_graphql::MergedObject;

#[derive(MergedObject, Default)]
pub struct Query(user::UserQuery);

pub fn create_query() -> Query {
    Query(user::UserQuery)
}
