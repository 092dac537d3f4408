//! View-model plumbing on top of the Strato event aggregator: observable
//! properties, commands, navigation and window management.

mod listeners;

pub mod commands;
pub mod navigation;
pub mod view_model;
pub mod windows;

pub use commands::{AsyncCommand, Command, ListenerId, RelayCommand};
pub use navigation::{NavigationContext, NavigationTarget};
pub use view_model::{
    DependencyGraph, PropertyNotification, PropertyStore, ViewModel, ViewModelBase,
};
pub use windows::{ManagedWindow, Window, WindowManager};
