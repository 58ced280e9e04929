fn main() {
    pdl_codegen::Compiler::new()
        .file("schemas/common.pdl")
        .file("schemas/echo.pdl")
        .file("schemas/auth.pdl")
        .file("schemas/users.pdl")
        .file("schemas/counter.pdl")
        .module_name("fixtures")
        .run()
        .expect("fixture schemas should compile");
}
