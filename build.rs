fn main() {
    println!("cargo:rerun-if-changed=src/http/control_page.html");

    // Only firmware builds need the ESP-IDF environment exported; host
    // test builds run without embuild.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
