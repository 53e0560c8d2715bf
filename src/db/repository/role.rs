//! Role links: which single role record, if any, an account holds.

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;

/// Hierarchy coordinates of an account's role record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleLink {
    Inspector { inspector_id: i64, neighborhood_id: i64, district_id: i64, region_id: i64 },
    NeighborhoodOfficer { neighborhood_id: i64, district_id: i64, region_id: i64 },
    Psychiatrist { psychiatrist_id: i64, district_id: i64, region_id: i64 },
    DistrictAdmin { district_id: i64, region_id: i64 },
    RegionAdmin { region_id: i64 },
}

/// First role link found, checked in the order inspector, neighborhood
/// officer, psychiatrist, district admin, region admin.
pub fn find_role_link(conn: &Connection, account_id: i64) -> Result<Option<RoleLink>, DatabaseError> {
    if let Some(link) = conn
        .query_row(
            "SELECT i.id, i.neighborhood_id, n.district_id, d.region_id
             FROM inspectors i
             JOIN neighborhoods n ON n.id = i.neighborhood_id
             JOIN districts d ON d.id = n.district_id
             WHERE i.user_id = ?1",
            params![account_id],
            |row| {
                Ok(RoleLink::Inspector {
                    inspector_id: row.get(0)?,
                    neighborhood_id: row.get(1)?,
                    district_id: row.get(2)?,
                    region_id: row.get(3)?,
                })
            },
        )
        .optional()?
    {
        return Ok(Some(link));
    }

    if let Some(link) = conn
        .query_row(
            "SELECT n.id, n.district_id, d.region_id
             FROM neighborhoods n JOIN districts d ON d.id = n.district_id
             WHERE n.user_id = ?1",
            params![account_id],
            |row| {
                Ok(RoleLink::NeighborhoodOfficer {
                    neighborhood_id: row.get(0)?,
                    district_id: row.get(1)?,
                    region_id: row.get(2)?,
                })
            },
        )
        .optional()?
    {
        return Ok(Some(link));
    }

    if let Some(link) = conn
        .query_row(
            "SELECT ps.id, ps.district_id, d.region_id
             FROM psychiatrists ps JOIN districts d ON d.id = ps.district_id
             WHERE ps.user_id = ?1",
            params![account_id],
            |row| {
                Ok(RoleLink::Psychiatrist {
                    psychiatrist_id: row.get(0)?,
                    district_id: row.get(1)?,
                    region_id: row.get(2)?,
                })
            },
        )
        .optional()?
    {
        return Ok(Some(link));
    }

    if let Some(link) = conn
        .query_row(
            "SELECT da.district_id, d.region_id
             FROM district_admins da JOIN districts d ON d.id = da.district_id
             WHERE da.user_id = ?1",
            params![account_id],
            |row| {
                Ok(RoleLink::DistrictAdmin {
                    district_id: row.get(0)?,
                    region_id: row.get(1)?,
                })
            },
        )
        .optional()?
    {
        return Ok(Some(link));
    }

    Ok(conn
        .query_row(
            "SELECT region_id FROM region_admins WHERE user_id = ?1",
            params![account_id],
            |row| Ok(RoleLink::RegionAdmin { region_id: row.get(0)? }),
        )
        .optional()?)
}

/// Number of role records pointing at the account, across all five kinds.
pub fn count_role_links(conn: &Connection, account_id: i64) -> Result<i64, DatabaseError> {
    Ok(conn.query_row(
        "SELECT (SELECT COUNT(*) FROM inspectors WHERE user_id = ?1)
              + (SELECT COUNT(*) FROM neighborhoods WHERE user_id = ?1)
              + (SELECT COUNT(*) FROM psychiatrists WHERE user_id = ?1)
              + (SELECT COUNT(*) FROM district_admins WHERE user_id = ?1)
              + (SELECT COUNT(*) FROM region_admins WHERE user_id = ?1)",
        params![account_id],
        |row| row.get(0),
    )?)
}

/// Refuse an account that already holds a role.
pub fn ensure_account_free(conn: &Connection, account_id: i64) -> Result<(), DatabaseError> {
    if count_role_links(conn, account_id)? > 0 {
        return Err(DatabaseError::ConstraintViolation(format!(
            "account {account_id} already holds a role"
        )));
    }
    Ok(())
}

pub fn assign_district_admin(
    conn: &Connection,
    account_id: i64,
    district_id: i64,
) -> Result<(), DatabaseError> {
    ensure_account_free(conn, account_id)?;
    conn.execute(
        "INSERT INTO district_admins (district_id, user_id) VALUES (?1, ?2)",
        params![district_id, account_id],
    )?;
    Ok(())
}

pub fn assign_region_admin(
    conn: &Connection,
    account_id: i64,
    region_id: i64,
) -> Result<(), DatabaseError> {
    ensure_account_free(conn, account_id)?;
    conn.execute(
        "INSERT INTO region_admins (region_id, user_id) VALUES (?1, ?2)",
        params![region_id, account_id],
    )?;
    Ok(())
}

/// Link the account as officer of a neighborhood that has none.
pub fn assign_neighborhood_officer(
    conn: &Connection,
    account_id: i64,
    neighborhood_id: i64,
) -> Result<(), DatabaseError> {
    ensure_account_free(conn, account_id)?;
    let changed = conn.execute(
        "UPDATE neighborhoods SET user_id = ?1 WHERE id = ?2 AND user_id IS NULL",
        params![account_id, neighborhood_id],
    )?;
    if changed == 0 {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM neighborhoods WHERE id = ?1)",
            params![neighborhood_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(DatabaseError::not_found("Neighborhood", neighborhood_id));
        }
        return Err(DatabaseError::ConstraintViolation(format!(
            "neighborhood {neighborhood_id} already has an officer"
        )));
    }
    Ok(())
}

/// Drop admin and officer links. Inspector and psychiatrist records are
/// staff entries and are removed through their own endpoints.
pub fn clear_admin_links(conn: &Connection, account_id: i64) -> Result<usize, DatabaseError> {
    let mut removed = conn.execute("DELETE FROM district_admins WHERE user_id = ?1", params![account_id])?;
    removed += conn.execute("DELETE FROM region_admins WHERE user_id = ?1", params![account_id])?;
    removed += conn.execute(
        "UPDATE neighborhoods SET user_id = NULL WHERE user_id = ?1",
        params![account_id],
    )?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;

    #[test]
    fn resolves_each_role_kind() {
        let (conn, seed) = fixtures::seeded();

        assert!(matches!(
            find_role_link(&conn, seed.inspector_a1_account).unwrap(),
            Some(RoleLink::Inspector { inspector_id, neighborhood_id, .. })
                if inspector_id == seed.inspector_a1 && neighborhood_id == seed.hood_a1
        ));
        assert!(matches!(
            find_role_link(&conn, seed.officer_a1_account).unwrap(),
            Some(RoleLink::NeighborhoodOfficer { neighborhood_id, .. }) if neighborhood_id == seed.hood_a1
        ));
        assert!(matches!(
            find_role_link(&conn, seed.psychiatrist_a_account).unwrap(),
            Some(RoleLink::Psychiatrist { district_id, .. }) if district_id == seed.district_a
        ));
        assert!(matches!(
            find_role_link(&conn, seed.district_admin_account).unwrap(),
            Some(RoleLink::DistrictAdmin { district_id, .. }) if district_id == seed.district_a
        ));
        assert_eq!(
            find_role_link(&conn, seed.region_admin_account).unwrap(),
            Some(RoleLink::RegionAdmin { region_id: seed.region })
        );
        assert_eq!(find_role_link(&conn, seed.superuser_account).unwrap(), None);
    }

    #[test]
    fn second_role_is_refused() {
        let (conn, seed) = fixtures::seeded();
        let err = assign_region_admin(&conn, seed.district_admin_account, seed.region).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
        assert_eq!(count_role_links(&conn, seed.district_admin_account).unwrap(), 1);
    }

    #[test]
    fn officer_assignment_needs_vacant_neighborhood() {
        let (conn, seed) = fixtures::seeded();
        let fresh = fixtures::account(&conn, "fresh");
        let err = assign_neighborhood_officer(&conn, fresh, seed.hood_a1).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));

        assign_neighborhood_officer(&conn, fresh, seed.hood_a2).unwrap();
        assert!(matches!(
            find_role_link(&conn, fresh).unwrap(),
            Some(RoleLink::NeighborhoodOfficer { neighborhood_id, .. }) if neighborhood_id == seed.hood_a2
        ));
    }

    #[test]
    fn clearing_links_makes_account_unrestricted() {
        let (conn, seed) = fixtures::seeded();
        assert_eq!(clear_admin_links(&conn, seed.district_admin_account).unwrap(), 1);
        assert_eq!(find_role_link(&conn, seed.district_admin_account).unwrap(), None);
    }
}
