//! Writes the in-app notification row, then attempts push delivery.
//! The row always lands first; a push failure is logged and swallowed so
//! fan-out can never fail a lifecycle transition.

use std::sync::Arc;

use rusqlite::Connection;
use tracing::warn;
use uuid::Uuid;

use crate::db::repository;
use crate::db::StoreError;
use crate::models::enums::{ActorRole, ClinicianRole};
use crate::models::Notification;

use super::push::{PushTransport, SimulatedPush};
use super::templates::{render, TemplateData, TemplateKey};

pub struct Dispatcher {
    transport: Box<dyn PushTransport>,
}

impl Dispatcher {
    pub fn new(transport: Box<dyn PushTransport>) -> Self {
        Self { transport }
    }

    /// Dispatcher wired to an in-memory recorder, plus a handle to it.
    pub fn simulated() -> (Self, Arc<SimulatedPush>) {
        let push = Arc::new(SimulatedPush::default());
        (Self::new(Box::new(push.clone())), push)
    }

    /// Notify one user. Returns the stored notification.
    pub fn notify_user(
        &self,
        conn: &Connection,
        recipient_id: &Uuid,
        key: TemplateKey,
        data: &TemplateData,
        related_request_id: Option<Uuid>,
    ) -> Result<Notification, StoreError> {
        let message = render(key, data);
        let notification = Notification {
            id: Uuid::new_v4(),
            recipient_id: *recipient_id,
            title: message.title.clone(),
            message: message.body.clone(),
            category: key.category(),
            related_request_id,
            read: false,
            created_at: repository::now(),
        };
        repository::insert_notification(conn, &notification)?;

        if let Some(user) = repository::get_user(conn, recipient_id)? {
            if let Some(token) = user.push_token.as_deref() {
                if let Err(e) = self.transport.send(token, &message.title, &message.body) {
                    warn!(recipient = %recipient_id, error = %e, "push delivery failed");
                }
            }
        }
        Ok(notification)
    }

    /// Fan out to every active user with the given role. Returns how many
    /// were notified.
    pub fn notify_role(
        &self,
        conn: &Connection,
        role: ActorRole,
        key: TemplateKey,
        data: &TemplateData,
        related_request_id: Option<Uuid>,
    ) -> Result<usize, StoreError> {
        let users = repository::list_users_by_role(conn, role)?;
        for user in &users {
            self.notify_user(conn, &user.id, key, data, related_request_id)?;
        }
        Ok(users.len())
    }

    /// Fan out to the currently-available clinicians of a role, optionally
    /// narrowed by specialty. This is the pool that could act on the work.
    pub fn notify_available_clinicians(
        &self,
        conn: &Connection,
        role: ClinicianRole,
        specialty: Option<&str>,
        key: TemplateKey,
        data: &TemplateData,
        related_request_id: Option<Uuid>,
    ) -> Result<usize, StoreError> {
        let clinicians = repository::list_available_clinicians(conn, role, specialty)?;
        for clinician in &clinicians {
            self.notify_user(
                conn,
                &clinician.profile.user_id,
                key,
                data,
                related_request_id,
            )?;
        }
        Ok(clinicians.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{count_unread, insert_user, list_notifications_for};
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::NotificationCategory;
    use crate::models::User;

    fn seed_user(conn: &Connection, role: ActorRole, token: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        insert_user(
            conn,
            &User {
                id,
                name: "x".into(),
                role,
                active: true,
                push_token: token.map(str::to_string),
            },
        )
        .unwrap();
        id
    }

    #[test]
    fn row_is_stored_and_push_sent_when_token_present() {
        let conn = open_memory_database().unwrap();
        let (dispatcher, push) = Dispatcher::simulated();
        let recipient = seed_user(&conn, ActorRole::Patient, Some("ExponentPushToken[a]"));

        dispatcher
            .notify_user(
                &conn,
                &recipient,
                TemplateKey::PrescriptionReady,
                &TemplateData {
                    clinician_name: Some("Dra. Ana".into()),
                    ..Default::default()
                },
                None,
            )
            .unwrap();

        let listed = list_notifications_for(&conn, &recipient).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "Receita Pronta!");
        assert_eq!(listed[0].category, NotificationCategory::Prescription);
        assert_eq!(push.sent_count(), 1);
    }

    #[test]
    fn no_token_still_stores_the_row() {
        let conn = open_memory_database().unwrap();
        let (dispatcher, push) = Dispatcher::simulated();
        let recipient = seed_user(&conn, ActorRole::Patient, None);

        dispatcher
            .notify_user(
                &conn,
                &recipient,
                TemplateKey::ExamForwarded,
                &TemplateData::default(),
                None,
            )
            .unwrap();

        assert_eq!(count_unread(&conn, &recipient).unwrap(), 1);
        assert_eq!(push.sent_count(), 0);
    }

    #[test]
    fn missing_template_value_still_stores_a_row() {
        let conn = open_memory_database().unwrap();
        let (dispatcher, _push) = Dispatcher::simulated();
        let recipient = seed_user(&conn, ActorRole::Patient, None);

        dispatcher
            .notify_user(
                &conn,
                &recipient,
                TemplateKey::RequestRejected,
                &TemplateData::default(),
                None,
            )
            .unwrap();

        let listed = list_notifications_for(&conn, &recipient).unwrap();
        assert_eq!(listed.len(), 1);
        // Unformatted fallback, not a dropped message.
        assert!(listed[0].message.contains("{reason}"));
    }

    #[test]
    fn role_fan_out_reaches_every_active_user() {
        let conn = open_memory_database().unwrap();
        let (dispatcher, _push) = Dispatcher::simulated();
        let a = seed_user(&conn, ActorRole::Admin, None);
        let b = seed_user(&conn, ActorRole::Admin, None);
        seed_user(&conn, ActorRole::Patient, None);

        let notified = dispatcher
            .notify_role(
                &conn,
                ActorRole::Admin,
                TemplateKey::NewRequest,
                &TemplateData {
                    request_label: Some("receita".into()),
                    ..Default::default()
                },
                None,
            )
            .unwrap();
        assert_eq!(notified, 2);
        assert_eq!(count_unread(&conn, &a).unwrap(), 1);
        assert_eq!(count_unread(&conn, &b).unwrap(), 1);
    }

    #[test]
    fn clinician_fan_out_skips_the_unavailable() {
        let conn = open_memory_database().unwrap();
        let (dispatcher, _push) = Dispatcher::simulated();
        let on_call = seed_user(&conn, ActorRole::Nurse, None);
        let off_duty = seed_user(&conn, ActorRole::Nurse, None);
        for (id, available) in [(on_call, true), (off_duty, false)] {
            crate::db::repository::insert_clinician_profile(
                &conn,
                &crate::models::ClinicianProfile {
                    user_id: id,
                    role: ClinicianRole::Nurse,
                    specialty: None,
                    available,
                    active_case_count: 0,
                    total_completed_cases: 0,
                    rating: 5.0,
                    max_concurrent_cases: 5,
                },
            )
            .unwrap();
        }

        let notified = dispatcher
            .notify_available_clinicians(
                &conn,
                ClinicianRole::Nurse,
                None,
                TemplateKey::NewRequest,
                &TemplateData {
                    request_label: Some("exame".into()),
                    ..Default::default()
                },
                None,
            )
            .unwrap();
        assert_eq!(notified, 1);
        assert_eq!(count_unread(&conn, &on_call).unwrap(), 1);
        assert_eq!(count_unread(&conn, &off_duty).unwrap(), 0);
    }
}
