pub mod ext_workspace;
