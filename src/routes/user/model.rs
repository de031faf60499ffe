use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct MockUser {
    pub id: u32,
    pub name: &'static str,
    pub email: &'static str,
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<MockUser>,
    pub cf_ray: String,
    pub worker_id: String,
}

pub fn mock_users() -> Vec<MockUser> {
    vec![
        MockUser {
            id: 1,
            name: "John Doe",
            email: "john@example.com",
        },
        MockUser {
            id: 2,
            name: "Jane Smith",
            email: "jane@example.com",
        },
    ]
}
