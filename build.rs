fn main() {
    println!("cargo:rerun-if-env-changed=THERMOVALVE_CONFIG");

    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
