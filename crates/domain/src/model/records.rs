//! Records with plain CRUD and no stock side effects.

use chrono::{DateTime, NaiveDate, Utc};
use common::DocumentId;
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityKind, Patch, ensure_present, ensure_quantity};
use crate::error::{DomainError, Result};

fn stamp(
    created_at: &mut Option<DateTime<Utc>>,
    updated_at: &mut Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) {
    created_at.get_or_insert(now);
    *updated_at = Some(now);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    #[serde(default)]
    pub id: DocumentId,
    pub name: String,
    /// Surface in hectares.
    #[serde(default)]
    pub area: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soil_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for Field {
    const COLLECTION: &'static str = "fields";
    const KIND: EntityKind = EntityKind::Field;

    fn id(&self) -> &DocumentId {
        &self.id
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn validate(&self) -> Result<()> {
        ensure_present("name", &self.name)?;
        ensure_quantity("area", self.area)
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        stamp(&mut self.created_at, &mut self.updated_at, now);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soil_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Patch<Field> for FieldPatch {
    fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            ensure_present("name", name)?;
        }
        if let Some(area) = self.area {
            ensure_quantity("area", area)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warehouse {
    #[serde(default)]
    pub id: DocumentId,
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_id: Option<DocumentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for Warehouse {
    const COLLECTION: &'static str = "warehouses";
    const KIND: EntityKind = EntityKind::Warehouse;

    fn id(&self) -> &DocumentId {
        &self.id
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn validate(&self) -> Result<()> {
        ensure_present("name", &self.name)?;
        if let Some(capacity) = self.capacity {
            ensure_quantity("capacity", capacity)?;
        }
        Ok(())
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        stamp(&mut self.created_at, &mut self.updated_at, now);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarehousePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_id: Option<DocumentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Patch<Warehouse> for WarehousePatch {
    fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            ensure_present("name", name)?;
        }
        if let Some(capacity) = self.capacity {
            ensure_quantity("capacity", capacity)?;
        }
        Ok(())
    }
}

/// A purchase of supplies. Recording it does not change stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    #[serde(default)]
    pub id: DocumentId,
    pub supplier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<DocumentId>,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub unit_price: f64,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for Purchase {
    const COLLECTION: &'static str = "purchases";
    const KIND: EntityKind = EntityKind::Purchase;

    fn id(&self) -> &DocumentId {
        &self.id
    }

    fn display_name(&self) -> String {
        match &self.invoice_number {
            Some(invoice) => format!("{} #{invoice}", self.supplier),
            None => self.supplier.clone(),
        }
    }

    fn validate(&self) -> Result<()> {
        ensure_present("supplier", &self.supplier)?;
        ensure_quantity("quantity", self.quantity)?;
        ensure_quantity("unitPrice", self.unit_price)?;
        ensure_quantity("totalAmount", self.total_amount)
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        if self.total_amount == 0.0 {
            self.total_amount = self.quantity * self.unit_price;
        }
        stamp(&mut self.created_at, &mut self.updated_at, now);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchasePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Patch<Purchase> for PurchasePatch {
    fn validate(&self) -> Result<()> {
        if let Some(supplier) = &self.supplier {
            ensure_present("supplier", supplier)?;
        }
        for (field, value) in [
            ("quantity", self.quantity),
            ("unitPrice", self.unit_price),
            ("totalAmount", self.total_amount),
        ] {
            if let Some(value) = value {
                ensure_quantity(field, value)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    #[serde(default)]
    pub id: DocumentId,
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_id: Option<DocumentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for Expense {
    const COLLECTION: &'static str = "expenses";
    const KIND: EntityKind = EntityKind::Expense;

    fn id(&self) -> &DocumentId {
        &self.id
    }

    fn display_name(&self) -> String {
        if self.description.is_empty() {
            self.category.clone()
        } else {
            self.description.clone()
        }
    }

    fn validate(&self) -> Result<()> {
        ensure_present("category", &self.category)?;
        ensure_quantity("amount", self.amount)
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        stamp(&mut self.created_at, &mut self.updated_at, now);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpensePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_id: Option<DocumentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Patch<Expense> for ExpensePatch {
    fn validate(&self) -> Result<()> {
        if let Some(category) = &self.category {
            ensure_present("category", category)?;
        }
        if let Some(amount) = self.amount {
            ensure_quantity("amount", amount)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Manager,
    #[default]
    Operator,
    Viewer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: DocumentId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for User {
    const COLLECTION: &'static str = "users";
    const KIND: EntityKind = EntityKind::User;

    fn id(&self) -> &DocumentId {
        &self.id
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn validate(&self) -> Result<()> {
        ensure_present("name", &self.name)?;
        validate_email(&self.email)
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        stamp(&mut self.created_at, &mut self.updated_at, now);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
}

impl Patch<User> for UserPatch {
    fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            ensure_present("name", name)?;
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        Ok(())
    }
}

fn validate_email(email: &str) -> Result<()> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(DomainError::validation(format!("invalid email: {email}"))),
    }
}
