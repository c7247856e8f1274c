//! Domain models for LitERP
//!
//! This module contains all the core domain models used throughout the application.

pub mod booking;
pub mod budget;
pub mod equipment;
pub mod expense;
pub mod hr;
pub mod invoice;
pub mod maintenance;
pub mod task;

pub use booking::{BookingChange, BookingStatus, BookingUpdate, EquipmentBooking, NewBooking};
pub use budget::{Budget, BudgetCategory, BudgetUpdate};
pub use equipment::{Equipment, EquipmentCategory, EquipmentStatus, EquipmentUpdate, NewEquipment};
pub use expense::{Expense, ExpenseCategory, ExpenseStatus, ExpenseUpdate, NewExpense};
pub use hr::{Attendance, LeaveRequest, LeaveStatus, LeaveType, LeaveUpdate, NewLeaveRequest};
pub use invoice::{
    Invoice, InvoiceChange, InvoiceItem, InvoiceStatus, InvoiceUpdate, NewInvoice,
    NewInvoiceItem, NewPayment, PaymentMethod, PaymentRecord, PreparedInvoice,
};
pub use maintenance::{
    MaintenanceRecord, MaintenanceSchedule, MaintenanceType, MaintenanceUpdate,
    NewMaintenanceRecord,
};
pub use task::{Task, TaskPriority, TaskStatus, TaskType, TaskUpdate};
